//! Browser session abstraction.
//!
//! The [`Session`] trait decouples the scanners from the browser backend
//! (currently WebDriver via `fantoccini`). Tests use a scripted in-memory
//! session that answers locators from a fixture instead of a live page.

use anyhow::Result;
use serde_json::Value;

use crate::core::locator::Locator;

/// Where a lookup is rooted: the whole page or a previously found element.
pub enum Scope<'a, E> {
    Page,
    Within(&'a E),
}

impl<E> Clone for Scope<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Scope<'_, E> {}

/// Synchronous view of one driven browser tab.
///
/// Lookups that match nothing return an empty list, not an error. Errors are
/// reserved for the browser rejecting the command.
pub trait Session {
    type Element: Clone;

    fn navigate(&self, url: &str) -> Result<()>;

    fn current_url(&self) -> Result<String>;

    fn find_all(
        &self,
        scope: Scope<'_, Self::Element>,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>>;

    fn find(
        &self,
        scope: Scope<'_, Self::Element>,
        locator: &Locator,
    ) -> Result<Option<Self::Element>> {
        Ok(self.find_all(scope, locator)?.into_iter().next())
    }

    /// The element's `textContent`.
    fn text(&self, element: &Self::Element) -> Result<String>;

    fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// The element's `value` property (form fields), if it has one.
    fn value(&self, element: &Self::Element) -> Result<Option<String>>;

    fn click(&self, element: &Self::Element) -> Result<()>;

    /// Run a script; `target`, when given, is passed as `arguments[0]`.
    fn execute(&self, script: &str, target: Option<&Self::Element>) -> Result<Value>;
}
