//! Scroll-and-count collection of result listings.
//!
//! The results feed only grows as it is scrolled and never reports a total,
//! so the loop scrolls, waits for the page to settle and counts listings
//! until one of these holds:
//!
//! 1. the count reached a bounded target,
//! 2. the count did not grow since the previous pass,
//! 3. the iteration ceiling was hit,
//! 4. the run was cancelled.

use std::time::Duration;

use mapscout_core::Target;
use serde::Serialize;

use crate::cancel::CancelSignal;
use crate::page::{PageContext, PageError};
use crate::selectors::Selectors;

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Termination {
    TargetReached,
    /// The list stopped growing; everything available was taken.
    Exhausted,
    /// The ceiling was hit while the list was still growing.
    Ambiguous { iterations: usize },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub scroll_delta: i64,
    /// Upper bound on the wait for new listings after each scroll.
    pub settle_timeout: Duration,
    /// Delay between listing counts while waiting for growth.
    pub poll_interval: Duration,
    pub max_iterations: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            scroll_delta: 10_000,
            settle_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
            max_iterations: 200,
        }
    }
}

/// Listing handles in discovery order, plus how the loop ended.
#[derive(Debug, Clone)]
pub struct Collected<H> {
    pub handles: Vec<H>,
    pub termination: Termination,
    pub iterations: usize,
}

/// Fixed-point detector over successive listing counts.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    target: Target,
    previous: usize,
}

impl StabilityTracker {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            previous: 0,
        }
    }

    /// Decides whether `current` ends the loop. Does not record `current`;
    /// call [`advance`](Self::advance) for that.
    #[must_use]
    pub fn check(&self, current: usize) -> Option<Termination> {
        if self.target.limit().is_some_and(|limit| current >= limit) {
            return Some(Termination::TargetReached);
        }
        if current == self.previous {
            return Some(Termination::Exhausted);
        }
        None
    }

    pub fn advance(&mut self, current: usize) {
        self.previous = current;
    }

    #[must_use]
    pub fn previous(&self) -> usize {
        self.previous
    }
}

/// Scrolls the results feed until the listing count settles or `target` is
/// reached, then returns the listing handles (at most `target` of them).
///
/// # Errors
///
/// Returns the [`PageError`] from a failed count or lookup. A scroll that
/// fails without a capability error is logged and the pass still counts.
pub async fn collect<P>(
    page: &P,
    selectors: &Selectors,
    target: Target,
    options: &CollectOptions,
    cancel: &CancelSignal,
) -> Result<Collected<P::Handle>, PageError>
where
    P: PageContext + ?Sized,
{
    let mut tracker = StabilityTracker::new(target);
    let mut iterations = 0usize;

    let termination = loop {
        if cancel.is_cancelled() {
            tracing::info!(iterations, seen = tracker.previous(), "collection cancelled");
            break Termination::Cancelled;
        }
        if iterations >= options.max_iterations {
            tracing::warn!(
                iterations,
                seen = tracker.previous(),
                "listing count still growing at iteration ceiling; keeping what was gathered"
            );
            break Termination::Ambiguous { iterations };
        }

        match page.scroll(0, options.scroll_delta).await {
            Ok(()) => {}
            Err(e) if e.is_capability() => return Err(e),
            Err(e) => tracing::warn!(error = %e, "scroll failed; counting anyway"),
        }
        page.wait_for_idle(options.settle_timeout).await?;
        iterations += 1;

        let current = wait_for_growth(page, selectors, &tracker, options, cancel).await?;
        tracing::debug!(iterations, current, previous = tracker.previous(), "scroll pass");

        if let Some(termination) = tracker.check(current) {
            break termination;
        }
        tracker.advance(current);
    };

    let mut handles = page.locate(None, &selectors.listing).await?;
    if let Some(limit) = target.limit() {
        handles.truncate(limit);
    }

    tracing::info!(
        collected = handles.len(),
        iterations,
        ?termination,
        "listing collection finished"
    );

    Ok(Collected {
        handles,
        termination,
        iterations,
    })
}

/// Re-counts listings until the count would not end the loop as
/// [`Termination::Exhausted`], or `settle_timeout` runs out. The feed keeps
/// loading after the page itself looks idle, so one count is not enough.
async fn wait_for_growth<P>(
    page: &P,
    selectors: &Selectors,
    tracker: &StabilityTracker,
    options: &CollectOptions,
    cancel: &CancelSignal,
) -> Result<usize, PageError>
where
    P: PageContext + ?Sized,
{
    let deadline = tokio::time::Instant::now() + options.settle_timeout;
    loop {
        let current = page.count(None, &selectors.listing).await?;
        if tracker.check(current) != Some(Termination::Exhausted)
            || cancel.is_cancelled()
            || tokio::time::Instant::now() >= deadline
        {
            return Ok(current);
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}
