//! Documentation scanner for a hosted low-code admin console.
//!
//! Drives a logged-in browser session through the console's configuration
//! screens and builds an aggregate of models, themes, views, code blocks,
//! workflows and methods, rendered as a Markdown report. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, naming rules,
//!   selector contracts, retry and stabilization). No I/O.
//! - **[`io`]**: Side-effecting operations (browser session, console, config,
//!   report and snapshot files). Isolated behind traits to enable fakes in tests.
//!
//! Orchestration modules ([`navigate`], [`catalog`], [`code_blocks`],
//! [`workflow`], [`methods`], [`run`]) coordinate core logic with I/O to
//! implement the scan passes and the interactive session.

pub mod catalog;
pub mod code_blocks;
pub mod context;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod methods;
pub mod navigate;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
