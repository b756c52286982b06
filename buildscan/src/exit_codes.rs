//! Stable exit codes for buildscan CLI commands.

/// Command succeeded, or the session ended from the menu.
pub const OK: i32 = 0;
/// Command failed due to invalid config/snapshot, a lost browser session, or other errors.
pub const FAILED: i32 = 1;
/// `buildscan scan` ended before scanning: the login was never detected.
pub const ABORTED: i32 = 2;
/// Ctrl-C before the scan started, or pressed twice.
pub const INTERRUPTED: i32 = 130;
