//! Bounded polling with an injectable clock.
//!
//! This is the only suspension primitive the scanners use: poll a check at a
//! fixed interval until it yields a value or the timeout elapses.

use std::time::Duration;

use thiserror::Error;

/// Monotonic time source. Tests inject a fake that advances on `sleep`.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct TimedOut(pub Duration);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Poll {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Run `check` until it returns `Some`, sleeping `interval` between tries.
    ///
    /// The check always runs at least once, even with a zero timeout.
    pub fn until<T>(
        &self,
        clock: &dyn Clock,
        mut check: impl FnMut() -> Option<T>,
    ) -> Result<T, TimedOut> {
        let start = clock.now();
        loop {
            if let Some(value) = check() {
                return Ok(value);
            }
            let elapsed = clock.now().saturating_sub(start);
            if elapsed >= self.timeout {
                return Err(TimedOut(self.timeout));
            }
            let remaining = self.timeout - elapsed;
            clock.sleep(self.interval.min(remaining));
        }
    }

    /// Like [`Poll::until`] for boolean conditions.
    pub fn until_true(
        &self,
        clock: &dyn Clock,
        mut condition: impl FnMut() -> bool,
    ) -> Result<(), TimedOut> {
        self.until(clock, || condition().then_some(()))
    }
}
