//! Integration tests for the scroll-and-count collector against a scripted
//! page.

mod common;

use std::num::NonZeroUsize;
use std::time::Duration;

use mapscout_core::Target;
use mapscout_scraper::{cancel_pair, collect, CancelSignal, CollectOptions, Selectors, Termination};

use common::{FakeHandle, FakePage};

fn bounded(n: usize) -> Target {
    Target::Bounded(NonZeroUsize::new(n).unwrap())
}

fn options() -> CollectOptions {
    CollectOptions {
        settle_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
        ..CollectOptions::default()
    }
}

#[tokio::test]
async fn stops_when_count_stops_growing() {
    let page = FakePage::new(vec![5, 9, 9]);

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options(),
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Exhausted);
    assert_eq!(collected.iterations, 3);
    assert_eq!(collected.handles.len(), 9);
    assert_eq!(page.scrolls(), 3);
}

#[tokio::test]
async fn short_circuits_at_target_and_truncates() {
    let page = FakePage::new(vec![5, 12, 20]);

    let collected = collect(
        &page,
        &Selectors::default(),
        bounded(10),
        &options(),
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::TargetReached);
    assert_eq!(collected.iterations, 2);
    assert_eq!(collected.handles.len(), 10);
    assert_eq!(collected.handles.first(), Some(&FakeHandle::Listing(0)));
    assert_eq!(collected.handles.last(), Some(&FakeHandle::Listing(9)));
}

#[tokio::test]
async fn target_above_available_returns_everything() {
    let page = FakePage::new(vec![3, 3]);

    let collected = collect(
        &page,
        &Selectors::default(),
        bounded(50),
        &options(),
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Exhausted);
    assert_eq!(collected.handles.len(), 3);
}

#[tokio::test]
async fn empty_feed_is_exhausted_after_one_pass() {
    let page = FakePage::new(vec![0]);

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options(),
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Exhausted);
    assert_eq!(collected.iterations, 1);
    assert!(collected.handles.is_empty());
}

#[tokio::test]
async fn ceiling_reports_ambiguous_and_keeps_what_was_seen() {
    let page = FakePage::new(vec![1, 2, 3, 4, 5, 6]);
    let options = CollectOptions {
        max_iterations: 3,
        ..options()
    };

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options,
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Ambiguous { iterations: 3 });
    assert_eq!(collected.handles.len(), 3);
    assert_eq!(page.scrolls(), 3);
}

#[tokio::test]
async fn cancellation_returns_partial_handles() {
    let (handle, signal) = cancel_pair();
    let page = FakePage::new(vec![2, 4, 6, 8]).cancel_after_reads(2, handle);

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options(),
        &signal,
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Cancelled);
    assert_eq!(collected.iterations, 2);
    assert_eq!(collected.handles.len(), 4);
}

#[tokio::test]
async fn already_cancelled_never_scrolls() {
    let (handle, signal) = cancel_pair();
    handle.cancel();
    let page = FakePage::new(vec![5, 9]);

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options(),
        &signal,
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Cancelled);
    assert_eq!(page.scrolls(), 0);
}

#[tokio::test]
async fn keeps_waiting_while_the_next_batch_is_still_loading() {
    // the count holds at 5 for two reads after the scroll before the next
    // batch lands
    let page = FakePage::new(vec![5, 5, 5, 12, 12]);

    let collected = collect(
        &page,
        &Selectors::default(),
        Target::Unbounded,
        &options(),
        &CancelSignal::never(),
    )
    .await
    .unwrap();

    assert_eq!(collected.termination, Termination::Exhausted);
    assert_eq!(collected.handles.len(), 12);
    assert_eq!(collected.iterations, 3);
}
