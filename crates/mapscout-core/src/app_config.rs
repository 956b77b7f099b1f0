use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Directory the file sink writes per-term CSV/JSON files into.
    pub output_dir: PathBuf,
    /// Landing page the search box lives on.
    pub maps_url: String,
    pub navigation_timeout_secs: u64,
    /// How long to wait for the first result after submitting a search.
    pub ready_timeout_secs: u64,
    /// Upper bound on each "page has settled" wait after scroll/click.
    pub settle_timeout_ms: u64,
    /// Vertical wheel delta sent on each collector iteration.
    pub scroll_delta: i64,
    /// Iteration ceiling for the scroll-and-count loop.
    pub max_scroll_iterations: usize,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// DevTools WebSocket URL of an already-running browser.
    pub remote_browser_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("output_dir", &self.output_dir)
            .field("maps_url", &self.maps_url)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("ready_timeout_secs", &self.ready_timeout_secs)
            .field("settle_timeout_ms", &self.settle_timeout_ms)
            .field("scroll_delta", &self.scroll_delta)
            .field("max_scroll_iterations", &self.max_scroll_iterations)
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .field(
                "remote_browser_url",
                &self.remote_browser_url.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
