//! Browser session drivers.
//!
//! Defines the `SessionDriver` trait the engine talks to, and provides
//! the production implementation over the W3C WebDriver protocol
//! (`chromedriver`). Tests substitute an in-memory fake.

pub mod selectors;
pub mod webdriver;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::errors::Result;

/// Opaque reference to an element located on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: String,
    pub selector: String,
}

/// Capabilities of an automated browsing session.
///
/// A driver is owned by exactly one deck session. `quit` releases the
/// underlying browser and is called once, whatever way the session ends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionDriver: Send {
    /// Load a URL in the current tab.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Reload the current page.
    async fn refresh(&mut self) -> Result<()>;

    /// Wait up to `timeout` for an element matching `selector` to be
    /// present, displayed and enabled.
    ///
    /// Returns `ScraperError::ElementNotFound` when the wait expires.
    async fn locate(&mut self, selector: &str, timeout: Duration) -> Result<Element>;

    async fn click(&mut self, element: &Element) -> Result<()>;

    /// Type into an input element.
    async fn type_text(&mut self, element: &Element, text: &str) -> Result<()>;

    /// Visible text of an element.
    async fn read_text(&mut self, element: &Element) -> Result<String>;

    /// Save a full-page PNG screenshot to `path`.
    async fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// Release the browser session.
    async fn quit(&mut self) -> Result<()>;

    /// Driver name for logging.
    fn name(&self) -> &'static str;
}
