//! The browser collaborator as seen by the scraping core.
//!
//! Everything the collector, extractor and orchestrator do to the browser goes
//! through [`PageContext`]. Operations on one context are always awaited one
//! at a time; implementations do not need to support overlapping calls.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a [`PageContext`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    /// The browser or page itself is gone (crashed, disconnected, closed).
    #[error("page unavailable: {reason}")]
    Unavailable { reason: String },

    /// A navigation or readiness wait did not complete in time.
    #[error("timed out after {waited_ms}ms waiting for {action}")]
    Timeout { action: String, waited_ms: u64 },

    /// A single element-level operation failed (stale handle, unreadable
    /// attribute, script error). The page itself is still usable.
    #[error("{action} failed: {reason}")]
    Operation { action: String, reason: String },
}

impl PageError {
    /// `true` when the failure means the page context can no longer be
    /// trusted for the current search term.
    #[must_use]
    pub fn is_capability(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    pub fn operation(action: impl Into<String>, reason: impl ToString) -> Self {
        Self::Operation {
            action: action.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(action: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            action: action.into(),
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// A single browser tab driven by the scraper.
///
/// Selectors are opaque strings owned by [`crate::selectors::Selectors`]; the
/// adapter decides how to interpret them (the Chromium adapter treats them as
/// XPath). A `scope` handle restricts a lookup to one element's subtree, with
/// the selector interpreted relative to that element.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Opaque reference to a located element. Valid only for the lifetime of
    /// the current page session.
    type Handle: Clone + Debug + Send + Sync;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Blocks until at least one element matches `selector`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), PageError>;

    /// Blocks until the page stops loading and mutating, or `timeout`
    /// elapses. Hitting the timeout is not an error; a busy page is still
    /// usable.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), PageError>;

    async fn fill_input(&self, selector: &str, text: &str) -> Result<(), PageError>;

    async fn press_key(&self, key: &str) -> Result<(), PageError>;

    /// Sends a wheel scroll to whatever is under the pointer (the last
    /// hovered element, or the document).
    async fn scroll(&self, dx: i64, dy: i64) -> Result<(), PageError>;

    async fn locate(
        &self,
        scope: Option<&Self::Handle>,
        selector: &str,
    ) -> Result<Vec<Self::Handle>, PageError>;

    async fn count(&self, scope: Option<&Self::Handle>, selector: &str)
        -> Result<usize, PageError>;

    async fn inner_text(&self, handle: &Self::Handle, timeout: Duration)
        -> Result<String, PageError>;

    async fn attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    async fn is_visible(&self, handle: &Self::Handle) -> Result<bool, PageError>;

    async fn click(&self, handle: &Self::Handle) -> Result<(), PageError>;

    async fn hover(&self, handle: &Self::Handle) -> Result<(), PageError>;
}
