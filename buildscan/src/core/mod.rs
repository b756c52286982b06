//! Deterministic, pure logic shared by the scanners.
//!
//! Core modules are free of browser and console side effects. They operate on
//! in-memory data and injected closures, which keeps them testable without a
//! live session.

pub mod aggregate;
pub mod invariants;
pub mod locator;
pub mod naming;
pub mod retry;
pub mod selectors;
pub mod skip;
pub mod stabilize;
