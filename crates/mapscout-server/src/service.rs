//! Scrape execution behind the HTTP handlers.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mapscout_core::{AppConfig, SearchRequest};
use mapscout_scraper::{
    BatchOptions, BatchReport, BatchRunner, BrowserOptions, CancelSignal, ChromeSession, FileSink,
    OutputFormat, Selectors,
};
use tokio::sync::Mutex;

/// Runs a validated [`SearchRequest`] to completion.
#[async_trait]
pub trait ScrapeService: Send + Sync {
    async fn scrape(&self, request: SearchRequest) -> anyhow::Result<BatchReport>;
}

/// Launches a browser per request and writes results to the configured
/// output directory.
///
/// Requests are served one at a time; a second request waits for the first
/// browser to close. The browser work runs on its own task, so a client that
/// disconnects mid-scrape still gets its results written and the browser
/// closed.
pub struct ChromeScrapeService {
    config: Arc<AppConfig>,
    running: Arc<Mutex<()>>,
}

impl ChromeScrapeService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            running: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl ScrapeService for ChromeScrapeService {
    async fn scrape(&self, request: SearchRequest) -> anyhow::Result<BatchReport> {
        let config = Arc::clone(&self.config);
        let running = Arc::clone(&self.running);
        detached(async move {
            let _guard = running.lock_owned().await;
            run_batch(&config, &request).await
        })
        .await
    }
}

/// Spawns `work` and waits for it. Dropping the returned future does not
/// stop `work`.
pub(crate) async fn detached<T, F>(work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    tokio::spawn(work).await.context("scrape task panicked")?
}

async fn run_batch(config: &AppConfig, request: &SearchRequest) -> anyhow::Result<BatchReport> {
    tracing::info!(
        terms = request.search_terms().len(),
        target = %request.target(),
        "starting scrape"
    );

    let session = ChromeSession::start(&BrowserOptions::from_config(config))
        .await
        .context("failed to start browser")?;
    let page = match session.new_page().await {
        Ok(page) => page,
        Err(e) => {
            session.close().await;
            return Err(e).context("failed to open browser tab");
        }
    };

    let runner = BatchRunner::new(page, Selectors::default(), BatchOptions::from_config(config));
    let mut sink = FileSink::new(config.output_dir.clone(), OutputFormat::Csv);
    let report = runner.run(request, &mut sink, &CancelSignal::never()).await;

    runner.into_page().close().await;
    session.close().await;
    Ok(report)
}
