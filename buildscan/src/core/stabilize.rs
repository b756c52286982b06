//! Count stabilization with a human sign-off.
//!
//! The model list renders lazily and has no "loading complete" signal. The
//! count is re-measured (each measurement includes a full scroll sweep) until
//! two consecutive measurements agree; only then is the human asked to
//! confirm. A rejection waits for the page to settle and starts over.

use anyhow::Result;
use tracing::{debug, info};

/// Stabilize a lazily rendered count and return the human-confirmed value.
///
/// - `measure` sweeps the container and returns the current count.
/// - `confirm` is the human oracle; `Ok(false)` means "not yet".
/// - `settle` runs after a rejection, before re-measuring.
pub fn stabilize(
    mut measure: impl FnMut() -> Result<usize>,
    mut confirm: impl FnMut(usize) -> Result<bool>,
    mut settle: impl FnMut(),
) -> Result<usize> {
    let mut previous = measure()?;
    debug!(count = previous, "initial measurement");
    loop {
        let current = measure()?;
        if current != previous {
            debug!(previous, current, "count still changing");
            previous = current;
            continue;
        }
        if confirm(current)? {
            info!(count = current, "count confirmed");
            return Ok(current);
        }
        debug!(count = current, "count rejected, waiting before re-measuring");
        settle();
    }
}
