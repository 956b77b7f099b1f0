//! Search-term loop: submit each term, collect listings, extract them and
//! hand the results to a sink.

use std::collections::BTreeMap;
use std::time::Duration;

use mapscout_core::{AppConfig, ResultCollection, SearchRequest, Target};
use serde::Serialize;

use crate::cancel::CancelSignal;
use crate::collect::{collect, CollectOptions, Termination};
use crate::error::ScraperError;
use crate::extract::{extract, ExtractOptions};
use crate::output::OutputSink;
use crate::page::{PageContext, PageError};
use crate::selectors::Selectors;

pub const DEFAULT_MAPS_URL: &str = "https://www.google.com/maps";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub maps_url: String,
    pub navigation_timeout: Duration,
    /// How long to wait for the search box and for the first listing.
    pub ready_timeout: Duration,
    /// Delay between checks while waiting for the first listing to show.
    pub poll_interval: Duration,
    pub collect: CollectOptions,
    pub extract: ExtractOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            maps_url: DEFAULT_MAPS_URL.to_string(),
            navigation_timeout: Duration::from_secs(60),
            ready_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(100),
            collect: CollectOptions::default(),
            extract: ExtractOptions::default(),
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let settle = Duration::from_millis(config.settle_timeout_ms);
        Self {
            maps_url: config.maps_url.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            poll_interval: Duration::from_millis(100),
            collect: CollectOptions {
                scroll_delta: config.scroll_delta,
                settle_timeout: settle,
                max_iterations: config.max_scroll_iterations,
                ..CollectOptions::default()
            },
            extract: ExtractOptions {
                settle_timeout: settle,
                ..ExtractOptions::default()
            },
        }
    }
}

/// Outcome of one search term.
#[derive(Debug, Clone, Serialize)]
pub struct TermReport {
    pub search_term: String,
    pub businesses: ResultCollection,
    /// Listings the extractor was run on.
    pub attempted: usize,
    /// Listings that produced a record.
    pub succeeded: usize,
    /// `None` when the term aborted before collection finished.
    pub termination: Option<Termination>,
    pub cancelled: bool,
    /// Why the term was aborted, if it was.
    pub error: Option<String>,
    /// Why the sink rejected the results, if it did.
    pub sink_error: Option<String>,
}

impl TermReport {
    fn new(search_term: &str) -> Self {
        Self {
            search_term: search_term.to_string(),
            businesses: ResultCollection::new(),
            attempted: 0,
            succeeded: 0,
            termination: None,
            cancelled: false,
            error: None,
            sink_error: None,
        }
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.succeeded)
    }
}

/// Per-term reports, in request order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub terms: Vec<TermReport>,
}

impl BatchReport {
    /// Term → results. A term given twice keeps its last run.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, ResultCollection> {
        self.terms
            .into_iter()
            .map(|t| (t.search_term, t.businesses))
            .collect()
    }

    #[must_use]
    pub fn total_records(&self) -> usize {
        self.terms.iter().map(|t| t.businesses.len()).sum()
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.terms.iter().any(|t| t.cancelled)
    }
}

/// Drives one page through every term of a [`SearchRequest`].
pub struct BatchRunner<P> {
    page: P,
    selectors: Selectors,
    options: BatchOptions,
}

impl<P: PageContext> BatchRunner<P> {
    pub fn new(page: P, selectors: Selectors, options: BatchOptions) -> Self {
        Self {
            page,
            selectors,
            options,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Scrapes every term in order. Never fails as a whole: per-term
    /// failures are recorded on the matching [`TermReport`].
    pub async fn run(
        &self,
        request: &SearchRequest,
        sink: &mut dyn OutputSink,
        cancel: &CancelSignal,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for term in request.search_terms() {
            if cancel.is_cancelled() {
                tracing::info!(term = %term, "run cancelled; skipping term");
                let mut skipped = TermReport::new(term);
                skipped.cancelled = true;
                report.terms.push(skipped);
                continue;
            }
            let term_report = self.run_term(term, request.target(), sink, cancel).await;
            report.terms.push(term_report);
        }

        tracing::info!(
            terms = report.terms.len(),
            records = report.total_records(),
            cancelled = report.was_cancelled(),
            "batch finished"
        );
        report
    }

    async fn run_term(
        &self,
        term: &str,
        target: Target,
        sink: &mut dyn OutputSink,
        cancel: &CancelSignal,
    ) -> TermReport {
        tracing::info!(term = %term, target = %target, "scraping term");
        let mut report = TermReport::new(term);

        if let Err(e) = self.scrape_term(term, target, cancel, &mut report).await {
            tracing::error!(term = %term, error = %e, "term aborted; keeping partial results");
            report.error = Some(e.to_string());
        }

        tracing::info!(
            term = %term,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed(),
            cancelled = report.cancelled,
            "term finished"
        );

        if let Err(e) = sink.accept(term, &report.businesses) {
            let e = ScraperError::from(e);
            tracing::error!(term = %term, error = %e, "failed to write results");
            report.sink_error = Some(e.to_string());
        }
        report
    }

    async fn scrape_term(
        &self,
        term: &str,
        target: Target,
        cancel: &CancelSignal,
        report: &mut TermReport,
    ) -> Result<(), ScraperError> {
        let page = &self.page;
        let selectors = &self.selectors;
        let options = &self.options;

        page.navigate(&options.maps_url, options.navigation_timeout).await?;
        page.wait_for_selector(&selectors.search_box, options.ready_timeout).await?;
        page.fill_input(&selectors.search_box, term).await?;
        page.press_key("Enter").await?;

        match page
            .wait_for_selector(&selectors.listing, options.ready_timeout)
            .await
        {
            Ok(()) => {}
            Err(PageError::Timeout { .. }) => {
                tracing::warn!(term = %term, "no listings appeared; treating as empty result");
                report.termination = Some(Termination::Exhausted);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        // Wheel events go to whatever is under the pointer; park it on the feed.
        if let Some(first) = page.locate(None, &selectors.listing).await?.first() {
            self.wait_until_visible(term, first).await?;
            match page.hover(first).await {
                Ok(()) => {}
                Err(e) if e.is_capability() => return Err(e.into()),
                Err(e) => tracing::warn!(term = %term, error = %e, "could not hover first listing"),
            }
        }

        let collected = collect(page, selectors, target, &options.collect, cancel).await?;
        report.termination = Some(collected.termination);
        if collected.termination == Termination::Cancelled {
            report.cancelled = true;
        }

        for (index, handle) in collected.handles.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(term = %term, index, "cancelled between listings");
                report.cancelled = true;
                break;
            }
            report.attempted += 1;
            match extract(page, handle, selectors, &options.extract).await {
                Ok(business) => {
                    report.businesses.push(business);
                    report.succeeded += 1;
                }
                Err(e) if e.is_capability() => return Err(e),
                Err(e) => tracing::warn!(term = %term, index, error = %e, "listing skipped"),
            }
        }
        Ok(())
    }

    /// Polls until `handle` is rendered, up to `ready_timeout`. A listing
    /// that never reports visible is hovered anyway.
    async fn wait_until_visible(&self, term: &str, handle: &P::Handle) -> Result<(), PageError> {
        let deadline = tokio::time::Instant::now() + self.options.ready_timeout;
        loop {
            match self.page.is_visible(handle).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.is_capability() => return Err(e),
                Err(e) => tracing::debug!(term = %term, error = %e, "visibility check failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(term = %term, "first listing never became visible; hovering anyway");
                return Ok(());
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapscout_core::Business;

    #[test]
    fn failed_is_attempted_minus_succeeded() {
        let mut report = TermReport::new("pizza");
        report.attempted = 7;
        report.succeeded = 5;
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn into_map_keys_by_term() {
        let mut first = TermReport::new("pizza");
        first.businesses.push(Business::at(1.0, 2.0));
        let second = TermReport::new("tacos");
        let report = BatchReport {
            terms: vec![first, second],
        };
        assert_eq!(report.total_records(), 1);

        let map = report.into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["pizza"].len(), 1);
        assert!(map["tacos"].is_empty());
    }

    #[test]
    fn options_follow_config_timeouts() {
        let config =
            mapscout_core::build_app_config(|_| Err(std::env::VarError::NotPresent)).unwrap();
        let options = BatchOptions::from_config(&config);
        assert_eq!(options.navigation_timeout, Duration::from_secs(60));
        assert_eq!(options.ready_timeout, Duration::from_secs(15));
        assert_eq!(options.collect.settle_timeout, Duration::from_millis(2000));
        assert_eq!(options.extract.settle_timeout, Duration::from_millis(2000));
        assert_eq!(options.collect.max_iterations, 200);
    }
}
