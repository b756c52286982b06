pub mod clock;
pub mod config;
pub mod console;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod webdriver;
