//! Shared state and wait helpers for the scanning passes.
//!
//! Every helper that can miss returns `Result<T, SkipReason>` so the calling
//! pass decides whether a miss skips an item, a theme, or the whole pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::core::locator::{Locator, resolve_first};
use crate::core::naming::candidate_identifiers;
use crate::core::retry::Clock;
use crate::core::selectors;
use crate::core::skip::SkipReason;
use crate::io::config::ScanConfig;
use crate::io::console::Prompter;
use crate::io::session::{Scope, Session};

/// User interrupt flag, set from the Ctrl-C listener and polled between items.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm before the next pass.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why a pass stopped before visiting every item.
#[derive(Debug, Error)]
pub enum PassError {
    /// Ctrl-C; whatever the pass already recorded stays in the aggregate.
    #[error("interrupted by user")]
    Interrupted,

    /// A required section could not be reached; the pass made no changes.
    #[error("could not reach {0}")]
    Navigation(String),

    /// The browser session is unusable.
    #[error(transparent)]
    Session(#[from] anyhow::Error),
}

/// Counters reported at the end of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub visited: usize,
    pub skipped: usize,
}

impl PassSummary {
    pub fn record<T>(&mut self, result: &Result<T, SkipReason>) {
        match result {
            Ok(_) => self.visited += 1,
            Err(_) => self.skipped += 1,
        }
    }
}

/// Turn an item-level skip into a pass-level stop when it was an interrupt.
pub fn stop_on_interrupt(reason: SkipReason) -> Result<SkipReason, PassError> {
    match reason {
        SkipReason::Interrupted => Err(PassError::Interrupted),
        other => Ok(other),
    }
}

pub struct ScanContext<'a, S: Session> {
    pub session: &'a S,
    pub prompter: &'a dyn Prompter,
    pub clock: &'a dyn Clock,
    pub config: &'a ScanConfig,
    pub interrupt: Interrupt,
}

impl<'a, S: Session> ScanContext<'a, S> {
    pub fn check_interrupt(&self) -> Result<(), PassError> {
        if self.interrupt.is_set() {
            Err(PassError::Interrupted)
        } else {
            Ok(())
        }
    }

    pub fn find(
        &self,
        scope: Scope<'_, S::Element>,
        locator: &Locator,
        what: &str,
    ) -> Result<S::Element, SkipReason> {
        match self.session.find(scope, locator) {
            Ok(Some(element)) => Ok(element),
            Ok(None) => Err(SkipReason::not_found(what)),
            Err(err) => Err(SkipReason::browser(&err)),
        }
    }

    pub fn find_all(
        &self,
        scope: Scope<'_, S::Element>,
        locator: &Locator,
    ) -> Result<Vec<S::Element>, SkipReason> {
        self.session
            .find_all(scope, locator)
            .map_err(|err| SkipReason::browser(&err))
    }

    /// Matches of the first candidate that finds anything, tried in order.
    ///
    /// Empty when no candidate matches; only a failure of the last candidate
    /// tried is reported.
    pub fn find_all_first(
        &self,
        scope: Scope<'_, S::Element>,
        candidates: &[Locator],
    ) -> Result<Vec<S::Element>, SkipReason> {
        let mut last_error = None;
        for locator in candidates {
            match self.session.find_all(scope, locator) {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => last_error = None,
                Err(err) => {
                    debug!(locator = %locator, err = %err, "candidate lookup failed");
                    last_error = Some(SkipReason::browser(&err));
                }
            }
        }
        last_error.map_or(Ok(Vec::new()), Err)
    }

    /// First element matched by any of `candidates`, tried in order.
    pub fn resolve(
        &self,
        scope: Scope<'_, S::Element>,
        candidates: &[Locator],
        what: &str,
    ) -> Result<S::Element, SkipReason> {
        resolve_first(candidates, |locator| self.session.find_all(scope, locator))
            .map(|resolved| {
                debug!(what, candidate = resolved.candidate, "resolved");
                resolved.element
            })
            .ok_or_else(|| SkipReason::not_found(what))
    }

    /// [`ScanContext::resolve`] polled until a candidate matches or `timeout_ms` elapses.
    pub fn wait_resolve(
        &self,
        scope: Scope<'_, S::Element>,
        candidates: &[Locator],
        timeout_ms: u64,
        what: &str,
    ) -> Result<S::Element, SkipReason> {
        let poll = self.config.timeouts.poll(timeout_ms);
        let found = poll.until(self.clock, || {
            if self.interrupt.is_set() {
                return Some(Err(SkipReason::Interrupted));
            }
            resolve_first(candidates, |locator| self.session.find_all(scope, locator))
                .map(|resolved| Ok(resolved.element))
        });
        match found {
            Ok(result) => result,
            Err(timed_out) => Err(SkipReason::timed_out(what, timed_out.0)),
        }
    }

    /// Poll until `locator` matches, up to `timeout_ms`.
    pub fn wait_for(
        &self,
        scope: Scope<'_, S::Element>,
        locator: &Locator,
        timeout_ms: u64,
        what: &str,
    ) -> Result<S::Element, SkipReason> {
        self.wait_for_all(scope, locator, timeout_ms, what)?
            .into_iter()
            .next()
            .ok_or_else(|| SkipReason::not_found(what))
    }

    /// Poll until `locator` matches at least one element, up to `timeout_ms`.
    pub fn wait_for_all(
        &self,
        scope: Scope<'_, S::Element>,
        locator: &Locator,
        timeout_ms: u64,
        what: &str,
    ) -> Result<Vec<S::Element>, SkipReason> {
        let poll = self.config.timeouts.poll(timeout_ms);
        let found = poll.until(self.clock, || {
            if self.interrupt.is_set() {
                return Some(Err(SkipReason::Interrupted));
            }
            match self.session.find_all(scope, locator) {
                Ok(elements) if !elements.is_empty() => Some(Ok(elements)),
                Ok(_) => None,
                Err(err) => {
                    debug!(what, err = %err, "lookup failed while waiting");
                    None
                }
            }
        });
        match found {
            Ok(result) => result,
            Err(timed_out) => {
                debug!(what, timeout_ms, "wait timed out");
                Err(SkipReason::timed_out(what, timed_out.0))
            }
        }
    }

    /// Poll a UI condition, up to `timeout_ms`. Lookup errors count as "not yet".
    pub fn wait_until(
        &self,
        timeout_ms: u64,
        what: &str,
        mut condition: impl FnMut() -> anyhow::Result<bool>,
    ) -> Result<(), SkipReason> {
        let poll = self.config.timeouts.poll(timeout_ms);
        let outcome = poll.until(self.clock, || {
            if self.interrupt.is_set() {
                return Some(Err(SkipReason::Interrupted));
            }
            match condition() {
                Ok(true) => Some(Ok(())),
                Ok(false) => None,
                Err(err) => {
                    debug!(what, err = %err, "condition check failed");
                    None
                }
            }
        });
        match outcome {
            Ok(result) => result,
            Err(timed_out) => Err(SkipReason::timed_out(what, timed_out.0)),
        }
    }

    /// Trimmed `textContent`.
    pub fn text(&self, element: &S::Element) -> Result<String, SkipReason> {
        self.session
            .text(element)
            .map(|text| text.trim().to_string())
            .map_err(|err| SkipReason::browser(&err))
    }

    /// Text of a form field: its `value`, falling back to `textContent`.
    ///
    /// `None` when the field is missing or blank.
    pub fn field_text(&self, scope: Scope<'_, S::Element>, locator: &Locator) -> Option<String> {
        let field = match self.session.find(scope, locator) {
            Ok(Some(field)) => field,
            Ok(None) => return None,
            Err(err) => {
                debug!(locator = %locator, err = %err, "field lookup failed");
                return None;
            }
        };
        let raw = match self.session.value(&field) {
            Ok(Some(value)) if !value.trim().is_empty() => value,
            _ => self.session.text(&field).ok()?,
        };
        let raw = raw.trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }

    pub fn click(&self, element: &S::Element, what: &str) -> Result<(), SkipReason> {
        self.session.click(element).map_err(|err| {
            debug!(what, err = %err, "click failed");
            SkipReason::browser(&err)
        })
    }

    /// Best effort; a failed scroll is left for the following click to surface.
    pub fn scroll_into_view(&self, element: &S::Element) {
        if let Err(err) = self.session.execute(
            "arguments[0].scrollIntoView({block: 'center'});",
            Some(element),
        ) {
            debug!(err = %err, "scrollIntoView failed");
        }
    }

    /// Find a model's block outside the Forms section.
    ///
    /// Tries every identifier format the console is known to use, in order.
    pub fn locate_model(&self, display: &str) -> Result<S::Element, SkipReason> {
        let candidates = candidate_identifiers(display, &self.config.dynamic_type_prefix);
        let locators = selectors::model_scopes(&candidates);
        self.resolve(Scope::Page, &locators, &format!("model link for {display}"))
    }

    /// Locate a model's block and click its label; returns the block.
    pub fn open_model(&self, display: &str) -> Result<S::Element, SkipReason> {
        let block = self.locate_model(display)?;
        let link = self.find(Scope::Within(&block), &selectors::model_link(), "model link")?;
        self.click(&link, "model link")?;
        Ok(block)
    }
}
