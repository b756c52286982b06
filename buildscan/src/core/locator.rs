//! Declarative element locators and the first-match resolver.

use std::fmt;

use tracing::debug;

/// A pure description of how to find elements. Carries no browser state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css:{selector}"),
            Locator::XPath(expression) => write!(f, "xpath:{expression}"),
        }
    }
}

/// A resolved element plus the index of the candidate that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub candidate: usize,
    pub element: T,
}

/// Try each candidate in order and return the first element found.
///
/// A lookup error counts as a miss for that candidate; the resolver itself
/// never fails. Callers treat `None` as "field unknown".
pub fn resolve_first<T, F>(candidates: &[Locator], mut lookup: F) -> Option<Resolved<T>>
where
    F: FnMut(&Locator) -> anyhow::Result<Vec<T>>,
{
    for (index, candidate) in candidates.iter().enumerate() {
        match lookup(candidate) {
            Ok(found) => {
                if let Some(element) = found.into_iter().next() {
                    return Some(Resolved {
                        candidate: index,
                        element,
                    });
                }
            }
            Err(err) => {
                debug!(locator = %candidate, err = %err, "candidate lookup failed");
            }
        }
    }
    None
}
