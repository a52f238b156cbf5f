//! Browser automation seam used by the search routine.
//!
//! - [`Browser`]: the DOM capabilities the scraper relies on
//! - [`FantocciniBrowser`]: WebDriver-backed implementation
//! - [`Session`]: lazily launched browser, reused until closed

mod session;
mod webdriver;

use std::time::Duration;

use async_trait::async_trait;
use miette::Result;
use serde_json::Value;

pub use session::{Launcher, Session};
pub use webdriver::{FantocciniBrowser, WebDriverLauncher};

/// Outcome of a DOM lookup that may legitimately come back empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Found(T),
    NotFound,
    TimedOut,
}

/// Capabilities of an automated browser, as needed to scrape a page.
///
/// Selectors are CSS selectors. Lookups scoped to an element only
/// search the descendants of that element.
#[async_trait]
pub trait Browser: Send {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Wait until an element matching `selector` exists, at most `timeout`
    async fn wait_for(&mut self, selector: &str, timeout: Duration)
        -> Result<Probe<Self::Element>>;

    async fn find_all(
        &mut self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>>;

    /// Closest ancestor of `element` with the given tag name
    async fn ancestor(&mut self, element: &Self::Element, tag: &str)
        -> Result<Option<Self::Element>>;

    async fn text(&mut self, element: &Self::Element) -> Result<String>;

    async fn attr(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn click(&mut self, element: &Self::Element) -> Result<()>;

    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<()>;

    /// Scroll the window down to the bottom of the document
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// End the browser session. The browser must not be used afterwards.
    async fn close(&mut self) -> Result<()>;
}
