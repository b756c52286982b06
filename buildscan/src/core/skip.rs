//! Typed reasons for best-effort skips.
//!
//! Every extraction step returns `Result<T, SkipReason>`. The enclosing loop
//! stores the value or records a [`Skipped`] marker, so the report can say why
//! a slot is empty instead of silently leaving it out.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An expected element was not present at lookup time.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A wait for an element or UI state exceeded its bound.
    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    TimedOut { what: String, timeout_ms: u64 },

    /// The browser rejected a command (stale element, script error, ...).
    #[error("browser error: {message}")]
    Browser { message: String },

    /// The user interrupted the pass while this item was in flight.
    #[error("interrupted by user")]
    Interrupted,
}

impl SkipReason {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn timed_out(what: impl Into<String>, timeout: Duration) -> Self {
        Self::TimedOut {
            what: what.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn browser(err: &anyhow::Error) -> Self {
        Self::Browser {
            message: format!("{err:#}"),
        }
    }
}

/// A unit (model, theme, state, action, method) that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    pub item: String,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn new(item: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            item: item.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_reports_milliseconds() {
        let reason = SkipReason::timed_out("config modal", Duration::from_secs(3));
        assert_eq!(
            reason.to_string(),
            "timed out after 3000ms waiting for config modal"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let skipped = Skipped::new("state #2", SkipReason::not_found("detail form"));
        let json = serde_json::to_value(&skipped).expect("serialize");
        assert_eq!(json["reason"]["kind"], "not_found");
        assert_eq!(json["reason"]["what"], "detail form");
    }
}
