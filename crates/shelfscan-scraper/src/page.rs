//! The browser control surface the scraper drives.
//!
//! Everything above this trait is browser-agnostic. [`crate::webdriver`]
//! provides the production implementation; tests script an in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScraperError;

/// One exclusive browser tab.
///
/// Selector arguments are CSS selectors. Probes (`count_first_match`, `is_visible`,
/// `text_of`) report absence as `0` / `false` / `None`, not as an error; an
/// `Err` means the browser itself failed.
#[async_trait]
pub trait ListingPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), ScraperError>;

    /// Wait until the document reports it has parsed, bounded by `timeout`.
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), ScraperError>;

    /// Run `script` in the page. `args` are exposed to it as `arguments`.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, ScraperError>;

    /// Match count of the first of `selectors` that matches at least one
    /// element, in one round trip. Same rule the DOM tier uses to pick its
    /// containers.
    async fn count_first_match(&self, selectors: &[String]) -> Result<usize, ScraperError>;

    async fn is_visible(&self, selector: &str) -> Result<bool, ScraperError>;

    async fn click(&self, selector: &str) -> Result<(), ScraperError>;

    /// Replace the value of the first matching input with `text`.
    async fn fill(&self, selector: &str, text: &str) -> Result<(), ScraperError>;

    async fn press_enter(&self, selector: &str) -> Result<(), ScraperError>;

    /// Scroll the first of `containers` that is scrollable, else the window.
    async fn scroll_by(&self, containers: &[String], delta_y: i64) -> Result<(), ScraperError>;

    /// Trimmed visible text of the first match, `None` if nothing matches.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScraperError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, ScraperError>;

    async fn current_url(&self) -> Result<String, ScraperError>;

    /// PNG bytes of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError>;

    async fn close(&self) -> Result<(), ScraperError>;
}

/// Opens fresh page sessions. Each worker holds one page at a time.
#[async_trait]
pub trait PageOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ListingPage>, ScraperError>;
}

/// Probe `candidates` in order and return the first selector with at least
/// one visible match. Probe errors count as "not visible".
pub async fn first_visible(page: &dyn ListingPage, candidates: &[String]) -> Option<String> {
    for selector in candidates {
        match page.is_visible(selector).await {
            Ok(true) => return Some(selector.clone()),
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(selector = %selector, error = %e, "visibility probe failed");
            }
        }
    }
    None
}

/// Re-run [`first_visible`] every `poll` until something matches or
/// `timeout` elapses.
pub async fn wait_for_any(
    page: &dyn ListingPage,
    candidates: &[String],
    timeout: Duration,
    poll: Duration,
) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(selector) = first_visible(page, candidates).await {
            return Some(selector);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(poll).await;
    }
}
