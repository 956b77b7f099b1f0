//! Chromium-backed [`PageContext`] over the DevTools protocol.
//!
//! Selectors are XPath expressions evaluated in the page with
//! `document.evaluate`. A [`ChromeHandle`] is an indexed XPath rather than a
//! live node reference, so it is re-resolved on every use and survives the
//! results feed re-rendering around it.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use mapscout_core::AppConfig;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::page::{PageContext, PageError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long the page must look unchanged before it counts as idle.
const IDLE_QUIET_WINDOW: Duration = Duration::from_millis(1000);

/// Returns `[document.readyState, number of resource entries]`. The timing
/// buffer is raised first; browsers stop recording at 250 entries by default.
const IDLE_PROBE_JS: &str = r"(() => {
    try { performance.setResourceTimingBufferSize(100000); } catch (_) {}
    return [document.readyState, performance.getEntriesByType('resource').length];
})()";

/// Scrolls the nearest scrollable ancestor of the node at `xp`, or the
/// window when there is none.
const SCROLL_JS: &str = r"(xp, dx, dy) => {
    let node = xp
        ? document.evaluate(xp, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue
        : null;
    while (node && node !== document.body && node !== document.documentElement) {
        const style = node.nodeType === 1 ? getComputedStyle(node) : null;
        if (style && /(auto|scroll)/.test(style.overflowY) && node.scrollHeight > node.clientHeight) {
            node.scrollBy(dx, dy);
            return true;
        }
        node = node.parentNode;
    }
    window.scrollBy(dx, dy);
    return false;
}";

const VISIBLE_JS: &str = r"(xp) => {
    const node = document.evaluate(xp, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    if (!node || node.nodeType !== 1) return false;
    const rect = node.getBoundingClientRect();
    const style = getComputedStyle(node);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
}";

/// How to obtain a browser.
#[derive(Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Chromium binary; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// DevTools WebSocket URL of a running browser. Takes precedence over
    /// launching one.
    pub remote_url: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BrowserOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserOptions")
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .field("remote_url", &self.remote_url.as_ref().map(|_| "[redacted]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl BrowserOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            remote_url: config.remote_browser_url.clone(),
            request_timeout: Duration::from_secs(config.navigation_timeout_secs),
        }
    }
}

/// A launched (or attached) browser plus its CDP event loop.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    owned: bool,
}

impl ChromeSession {
    /// Connects to `remote_url` when set, otherwise launches a local browser.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Unavailable`] when no browser can be started or
    /// reached.
    pub async fn start(options: &BrowserOptions) -> Result<Self, PageError> {
        let handler_config = HandlerConfig {
            request_timeout: options.request_timeout,
            ..HandlerConfig::default()
        };

        let (browser, mut handler, owned) = if let Some(url) = options.remote_url.as_deref() {
            tracing::info!("connecting to remote browser");
            let (browser, handler) = Browser::connect_with_config(url, handler_config)
                .await
                .map_err(|e| unavailable("connect to remote browser", &e))?;
            (browser, handler, false)
        } else {
            tracing::info!(headless = options.headless, "launching browser");
            let mut builder = BrowserConfig::builder().request_timeout(options.request_timeout);
            if let Some(path) = &options.chrome_path {
                builder = builder.chrome_executable(path);
            }
            // with_head means NOT headless
            if !options.headless {
                builder = builder.with_head();
            }
            let config = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--lang=en-US")
                .build()
                .map_err(|e| PageError::Unavailable {
                    reason: format!("invalid browser config: {e}"),
                })?;
            let (browser, handler) = Browser::launch(config)
                .await
                .map_err(|e| unavailable("launch browser", &e))?;
            (browser, handler, true)
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            owned,
        })
    }

    /// Opens a blank tab.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Unavailable`] when the browser refuses.
    pub async fn new_page(&self) -> Result<ChromePage, PageError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| unavailable("open tab", &e))?;
        Ok(ChromePage::new(page))
    }

    /// Closes a launched browser (a remote one is only detached from) and
    /// stops the handler task.
    pub async fn close(mut self) {
        if self.owned {
            if let Err(e) = self.browser.close().await {
                tracing::warn!(error = %e, "browser close failed");
            }
            if let Err(e) = self.browser.wait().await {
                tracing::debug!(error = %e, "browser wait failed");
            }
        }
        self.handler.abort();
    }
}

/// Indexed XPath pointing at one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeHandle {
    xpath: String,
}

impl ChromeHandle {
    #[must_use]
    pub fn xpath(&self) -> &str {
        &self.xpath
    }
}

/// One browser tab.
pub struct ChromePage {
    page: Page,
    /// Last hovered element; wheel scrolls are routed to its scroll container.
    hovered: Mutex<Option<String>>,
    /// Last filled input; key presses go to it.
    focused: Mutex<Option<String>>,
}

impl ChromePage {
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self {
            page,
            hovered: Mutex::new(None),
            focused: Mutex::new(None),
        }
    }

    /// Closes the tab.
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "tab close failed");
        }
    }

    async fn eval<T: DeserializeOwned>(&self, action: &str, script: String) -> Result<T, PageError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| cdp_error(action, e))?
            .into_value()
            .map_err(|e| PageError::operation(action, e))
    }

    async fn count_xpath(&self, xpath: &str) -> Result<usize, PageError> {
        let script = format!(
            "document.evaluate({}, document, null, XPathResult.NUMBER_TYPE, null).numberValue",
            js_string(&format!("count({xpath})"))
        );
        let value: f64 = self.eval("count", script).await?;
        Ok(to_count(value))
    }

    async fn element(&self, action: &str, xpath: &str) -> Result<chromiumoxide::Element, PageError> {
        self.page
            .find_xpath(xpath)
            .await
            .map_err(|e| cdp_error(action, e))
    }
}

#[async_trait]
impl PageContext for ChromePage {
    type Handle = ChromeHandle;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        tracing::debug!(url, "navigating");
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| PageError::timeout("navigation", timeout))?
            .map_err(|e| cdp_error("navigation", e))?;
        set(&self.hovered, None);
        set(&self.focused, None);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.page
            .url()
            .await
            .map_err(|e| cdp_error("current_url", e))?
            .ok_or_else(|| PageError::operation("current_url", "page has no url"))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), PageError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.count_xpath(selector).await {
                Ok(n) if n > 0 => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_capability() => return Err(e),
                // mid-navigation evaluation failures are expected
                Err(e) => tracing::trace!(error = %e, "selector probe failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PageError::timeout(selector.to_string(), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), PageError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut quiet = QuietWindow::new(IDLE_QUIET_WINDOW);
        loop {
            match self
                .eval::<(String, u64)>("idle probe", IDLE_PROBE_JS.to_string())
                .await
            {
                Ok(probe) => {
                    if quiet.observe(probe, tokio::time::Instant::now()) {
                        return Ok(());
                    }
                }
                Err(e) if e.is_capability() => return Err(e),
                Err(e) => tracing::trace!(error = %e, "idle probe failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::debug!(waited_ms = timeout.as_millis(), "page still busy; continuing");
                return Ok(());
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    async fn fill_input(&self, selector: &str, text: &str) -> Result<(), PageError> {
        let input = self.element("fill_input", selector).await?;
        input.click().await.map_err(|e| cdp_error("fill_input", e))?;
        input
            .type_str(text)
            .await
            .map_err(|e| cdp_error("fill_input", e))?;
        set(&self.focused, Some(selector.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), PageError> {
        let target = get(&self.focused).unwrap_or_else(|| "//body".to_string());
        let element = self.element("press_key", &target).await?;
        element
            .press_key(key)
            .await
            .map_err(|e| cdp_error("press_key", e))?;
        Ok(())
    }

    async fn scroll(&self, dx: i64, dy: i64) -> Result<(), PageError> {
        let anchor = get(&self.hovered).map_or_else(|| "null".to_string(), |xp| js_string(&xp));
        let script = format!("({SCROLL_JS})({anchor}, {dx}, {dy})");
        let scrolled_container: bool = self.eval("scroll", script).await?;
        if !scrolled_container {
            tracing::trace!("no scroll container under pointer; scrolled window");
        }
        Ok(())
    }

    async fn locate(
        &self,
        scope: Option<&ChromeHandle>,
        selector: &str,
    ) -> Result<Vec<ChromeHandle>, PageError> {
        let xpath = scoped(scope, selector);
        let n = self.count_xpath(&xpath).await?;
        Ok((1..=n)
            .map(|i| ChromeHandle {
                xpath: format!("({xpath})[{i}]"),
            })
            .collect())
    }

    async fn count(&self, scope: Option<&ChromeHandle>, selector: &str) -> Result<usize, PageError> {
        self.count_xpath(&scoped(scope, selector)).await
    }

    async fn inner_text(&self, handle: &ChromeHandle, timeout: Duration) -> Result<String, PageError> {
        let read = async {
            let element = self.element("inner_text", &handle.xpath).await?;
            element
                .inner_text()
                .await
                .map_err(|e| cdp_error("inner_text", e))
        };
        // Element-level: a slow read is not a page failure.
        let text = tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| PageError::operation("inner_text", "timed out"))??;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &self,
        handle: &ChromeHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let element = self.element("attribute", &handle.xpath).await?;
        element
            .attribute(name)
            .await
            .map_err(|e| cdp_error("attribute", e))
    }

    async fn is_visible(&self, handle: &ChromeHandle) -> Result<bool, PageError> {
        let script = format!("({VISIBLE_JS})({})", js_string(&handle.xpath));
        self.eval("is_visible", script).await
    }

    async fn click(&self, handle: &ChromeHandle) -> Result<(), PageError> {
        let element = self.element("click", &handle.xpath).await?;
        element.click().await.map_err(|e| cdp_error("click", e))?;
        Ok(())
    }

    async fn hover(&self, handle: &ChromeHandle) -> Result<(), PageError> {
        let element = self.element("hover", &handle.xpath).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| cdp_error("hover", e))?;
        set(&self.hovered, Some(handle.xpath.clone()));
        Ok(())
    }
}

/// Tracks how long successive idle readings have stayed identical on a fully
/// loaded document.
#[derive(Debug)]
struct QuietWindow {
    window: Duration,
    last: Option<(String, u64)>,
    since: Option<tokio::time::Instant>,
}

impl QuietWindow {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            since: None,
        }
    }

    /// Records `reading` taken at `now`; `true` once the document has been
    /// complete and unchanged for the whole window.
    fn observe(&mut self, reading: (String, u64), now: tokio::time::Instant) -> bool {
        if reading.0 != "complete" {
            self.last = None;
            self.since = None;
            return false;
        }
        if self.last.as_ref() != Some(&reading) {
            self.last = Some(reading);
            self.since = Some(now);
            return false;
        }
        self.since
            .is_some_and(|since| now.duration_since(since) >= self.window)
    }
}

/// Joins a relative selector onto a scope handle's XPath.
fn scoped(scope: Option<&ChromeHandle>, selector: &str) -> String {
    match scope {
        Some(handle) if selector.starts_with('/') => format!("{}{selector}", handle.xpath),
        Some(handle) => format!("{}/{selector}", handle.xpath),
        None => selector.to_string(),
    }
}

fn js_string(value: &str) -> String {
    // serde_json string escaping is valid JS string literal syntax
    serde_json::Value::String(value.to_string()).to_string()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value as usize
    } else {
        0
    }
}

fn get(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn set(slot: &Mutex<Option<String>>, value: Option<String>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

fn cdp_error(action: &str, error: CdpError) -> PageError {
    match error {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            unavailable(action, &error)
        }
        CdpError::Timeout => PageError::Timeout {
            action: action.to_string(),
            waited_ms: 0,
        },
        other => PageError::operation(action, other),
    }
}

fn unavailable(action: &str, error: &CdpError) -> PageError {
    PageError::Unavailable {
        reason: format!("{action}: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(xpath: &str) -> ChromeHandle {
        ChromeHandle {
            xpath: xpath.to_string(),
        }
    }

    #[test]
    fn scoped_appends_relative_axis_to_handle() {
        let listing = handle(r#"(//a[contains(@href, "/maps/place")])[3]"#);
        assert_eq!(
            scoped(Some(&listing), "/..//div[@class=\"x\"]"),
            r#"(//a[contains(@href, "/maps/place")])[3]/..//div[@class="x"]"#
        );
        assert_eq!(scoped(Some(&listing), "span"), format!("{}/span", listing.xpath));
        assert_eq!(scoped(None, "//input"), "//input");
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"//a[@x="y"]"#), r#""//a[@x=\"y\"]""#);
    }

    #[test]
    fn to_count_clamps_non_positive_and_nan() {
        assert_eq!(to_count(9.0), 9);
        assert_eq!(to_count(0.0), 0);
        assert_eq!(to_count(-1.0), 0);
        assert_eq!(to_count(f64::NAN), 0);
    }

    fn reading(state: &str, resources: u64) -> (String, u64) {
        (state.to_string(), resources)
    }

    #[test]
    fn quiet_window_needs_the_full_window_of_stability() {
        let start = tokio::time::Instant::now();
        let mut quiet = QuietWindow::new(Duration::from_millis(1000));

        assert!(!quiet.observe(reading("complete", 250), start));
        // two identical readings a poll apart are not enough
        assert!(!quiet.observe(reading("complete", 250), start + Duration::from_millis(250)));
        assert!(!quiet.observe(reading("complete", 250), start + Duration::from_millis(750)));
        assert!(quiet.observe(reading("complete", 250), start + Duration::from_millis(1000)));
    }

    #[test]
    fn quiet_window_restarts_on_new_resources_or_loading() {
        let start = tokio::time::Instant::now();
        let mut quiet = QuietWindow::new(Duration::from_millis(1000));

        quiet.observe(reading("complete", 10), start);
        assert!(!quiet.observe(reading("complete", 12), start + Duration::from_millis(900)));
        assert!(!quiet.observe(reading("complete", 12), start + Duration::from_millis(1500)));
        assert!(!quiet.observe(reading("interactive", 12), start + Duration::from_millis(2000)));
        assert!(!quiet.observe(reading("complete", 12), start + Duration::from_millis(2100)));
        assert!(quiet.observe(reading("complete", 12), start + Duration::from_millis(3100)));
    }

    #[test]
    fn browser_options_debug_redacts_remote_url() {
        let options = BrowserOptions {
            headless: true,
            chrome_path: None,
            remote_url: Some("ws://user:secret@host:9222/devtools/browser/abc".into()),
            request_timeout: Duration::from_secs(30),
        };
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
