//! Scripted in-memory stand-in for a maps search page.
//!
//! Listing counts are served from a script, one entry per `count` of the
//! listing selector (the last entry repeats). Listing `i` gets generated
//! detail data unless overridden with [`FakePage::with_listing`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mapscout_core::ResultCollection;
use mapscout_scraper::{CancelHandle, OutputSink, PageContext, PageError, Selectors, SinkError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeHandle {
    Listing(usize),
    Heading(usize),
    Field(&'static str),
}

#[derive(Debug, Clone)]
pub struct FakeListing {
    pub heading: Option<String>,
    pub label: Option<String>,
    pub card_text: String,
    pub url: String,
    pub address: Option<String>,
    pub address_fails: bool,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub rating_label: Option<String>,
    pub count_text: Option<String>,
    pub click_error: Option<PageError>,
    /// URL reads after a click before the detail view switches to this
    /// listing; `usize::MAX` keeps the previous view on screen.
    pub open_lag: usize,
}

impl FakeListing {
    pub fn generated(i: usize) -> Self {
        Self {
            heading: Some(format!("Place {i}")),
            label: Some(format!("Place {i} label")),
            card_text: format!("Place {i}\n4.{}({}0)", i % 10, i + 1),
            url: format!(
                "https://www.google.com/maps/place/Place+{i}/@40.{i:04},-73.{i:04},17z/data=!4m"
            ),
            address: Some(format!("{i} Main St")),
            address_fails: false,
            website: Some(format!("place{i}.example")),
            phone: Some(format!("+1 555-01{i:02}")),
            rating_label: Some(format!("4.{} stars", i % 10)),
            count_text: Some(format!("({},{:03})", i + 1, i)),
            click_error: None,
            open_lag: 0,
        }
    }
}

#[derive(Debug)]
struct State {
    script: Vec<usize>,
    reads: usize,
    current: usize,
    opened: Option<usize>,
    /// Clicked listing and URL reads left until its detail view shows.
    pending: Option<(usize, usize)>,
    scrolls: usize,
    hovered: Option<FakeHandle>,
    filled: Vec<String>,
    navigations: usize,
    navigation_failures: usize,
    hidden_checks: usize,
    visibility_checks: usize,
    cancel_after_reads: Option<(usize, CancelHandle)>,
}

pub struct FakePage {
    selectors: Selectors,
    overrides: HashMap<usize, FakeListing>,
    state: Mutex<State>,
}

impl FakePage {
    /// `script` is the sequence of listing counts returned by successive
    /// collector passes. The first entry is also what is visible before the
    /// first scroll.
    pub fn new(script: Vec<usize>) -> Self {
        let current = script.first().copied().unwrap_or(0);
        Self {
            selectors: Selectors::default(),
            overrides: HashMap::new(),
            state: Mutex::new(State {
                script,
                reads: 0,
                current,
                opened: None,
                pending: None,
                scrolls: 0,
                hovered: None,
                filled: Vec::new(),
                navigations: 0,
                navigation_failures: 0,
                hidden_checks: 0,
                visibility_checks: 0,
                cancel_after_reads: None,
            }),
        }
    }

    pub fn with_listing(mut self, index: usize, edit: impl FnOnce(&mut FakeListing)) -> Self {
        let mut listing = FakeListing::generated(index);
        edit(&mut listing);
        self.overrides.insert(index, listing);
        self
    }

    /// The first `n` navigations time out.
    pub fn failing_navigations(self, n: usize) -> Self {
        self.state.lock().unwrap().navigation_failures = n;
        self
    }

    /// The first `n` visibility checks report the element as not rendered.
    pub fn hidden_checks(self, n: usize) -> Self {
        self.state.lock().unwrap().hidden_checks = n;
        self
    }

    /// Raises `handle` once the listing count has been read `reads` times.
    pub fn cancel_after_reads(self, reads: usize, handle: CancelHandle) -> Self {
        self.state.lock().unwrap().cancel_after_reads = Some((reads, handle));
        self
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn filled(&self) -> Vec<String> {
        self.state.lock().unwrap().filled.clone()
    }

    pub fn visibility_checks(&self) -> usize {
        self.state.lock().unwrap().visibility_checks
    }

    pub fn hovered(&self) -> Option<FakeHandle> {
        self.state.lock().unwrap().hovered.clone()
    }

    fn listing(&self, index: usize) -> FakeListing {
        self.overrides
            .get(&index)
            .cloned()
            .unwrap_or_else(|| FakeListing::generated(index))
    }

    fn opened(&self) -> Option<FakeListing> {
        let opened = self.state.lock().unwrap().opened;
        opened.map(|i| self.listing(i))
    }

    /// Which detail field a selector names, if any.
    fn field_for(&self, selector: &str) -> Option<&'static str> {
        let s = &self.selectors;
        [
            (&s.address, "address"),
            (&s.website, "website"),
            (&s.phone, "phone"),
            (&s.review_count, "review_count"),
            (&s.reviews_average, "reviews_average"),
        ]
        .into_iter()
        .find(|(sel, _)| sel.as_str() == selector)
        .map(|(_, name)| name)
    }

    fn field_value(&self, field: &str) -> Result<Option<String>, PageError> {
        let Some(listing) = self.opened() else {
            return Ok(None);
        };
        match field {
            "address" if listing.address_fails => {
                Err(PageError::operation("address", "node detached"))
            }
            "address" => Ok(listing.address),
            "website" => Ok(listing.website),
            "phone" => Ok(listing.phone),
            "review_count" => Ok(listing.count_text),
            "reviews_average" => Ok(listing.rating_label),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PageContext for FakePage {
    type Handle = FakeHandle;

    async fn navigate(&self, _url: &str, timeout: Duration) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.navigations += 1;
        if state.navigation_failures > 0 {
            state.navigation_failures -= 1;
            return Err(PageError::timeout("navigation", timeout));
        }
        state.reads = 0;
        state.current = state.script.first().copied().unwrap_or(0);
        state.opened = None;
        state.pending = None;
        state.hovered = None;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        {
            let mut state = self.state.lock().unwrap();
            let pending = state.pending;
            match pending {
                Some((index, left)) if left <= 1 => {
                    state.opened = Some(index);
                    state.pending = None;
                }
                Some((index, left)) if left != usize::MAX => {
                    state.pending = Some((index, left - 1));
                }
                _ => {}
            }
        }
        Ok(self.opened().map_or_else(
            || "https://www.google.com/maps/search/query".to_string(),
            |l| l.url,
        ))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), PageError> {
        if selector == self.selectors.listing && self.state.lock().unwrap().current == 0 {
            return Err(PageError::timeout("first listing", timeout));
        }
        Ok(())
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<(), PageError> {
        Ok(())
    }

    async fn fill_input(&self, _selector: &str, text: &str) -> Result<(), PageError> {
        self.state.lock().unwrap().filled.push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, _key: &str) -> Result<(), PageError> {
        Ok(())
    }

    async fn scroll(&self, _dx: i64, _dy: i64) -> Result<(), PageError> {
        self.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn locate(
        &self,
        scope: Option<&FakeHandle>,
        selector: &str,
    ) -> Result<Vec<FakeHandle>, PageError> {
        match scope {
            Some(FakeHandle::Listing(i)) if selector == self.selectors.listing_heading => {
                Ok(self
                    .listing(*i)
                    .heading
                    .map(|_| vec![FakeHandle::Heading(*i)])
                    .unwrap_or_default())
            }
            Some(_) => Ok(Vec::new()),
            None if selector == self.selectors.listing => {
                let current = self.state.lock().unwrap().current;
                Ok((0..current).map(FakeHandle::Listing).collect())
            }
            None => match self.field_for(selector) {
                Some(field) => Ok(self
                    .field_value(field)?
                    .map(|_| vec![FakeHandle::Field(field)])
                    .unwrap_or_default()),
                None => Ok(Vec::new()),
            },
        }
    }

    async fn count(&self, scope: Option<&FakeHandle>, selector: &str) -> Result<usize, PageError> {
        if scope.is_none() && selector == self.selectors.listing {
            let mut state = self.state.lock().unwrap();
            let index = state.reads.min(state.script.len().saturating_sub(1));
            state.current = state.script.get(index).copied().unwrap_or(0);
            state.reads += 1;
            if let Some((after, handle)) = &state.cancel_after_reads {
                if state.reads >= *after {
                    handle.cancel();
                }
            }
            return Ok(state.current);
        }
        Ok(self.locate(scope, selector).await?.len())
    }

    async fn inner_text(&self, handle: &FakeHandle, _timeout: Duration) -> Result<String, PageError> {
        match handle {
            FakeHandle::Heading(i) => Ok(self.listing(*i).heading.unwrap_or_default()),
            FakeHandle::Listing(i) => Ok(self.listing(*i).card_text),
            FakeHandle::Field(field) => Ok(self.field_value(field)?.unwrap_or_default()),
        }
    }

    async fn attribute(
        &self,
        handle: &FakeHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        match handle {
            FakeHandle::Listing(i) if name == "aria-label" => Ok(self.listing(*i).label),
            FakeHandle::Field("reviews_average") if name == "aria-label" => {
                self.field_value("reviews_average")
            }
            _ => Ok(None),
        }
    }

    async fn is_visible(&self, _handle: &FakeHandle) -> Result<bool, PageError> {
        let mut state = self.state.lock().unwrap();
        state.visibility_checks += 1;
        if state.hidden_checks > 0 {
            state.hidden_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn click(&self, handle: &FakeHandle) -> Result<(), PageError> {
        let FakeHandle::Listing(i) = handle else {
            return Err(PageError::operation("click", "not a listing"));
        };
        let listing = self.listing(*i);
        if let Some(err) = listing.click_error {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        if listing.open_lag == 0 {
            state.opened = Some(*i);
            state.pending = None;
        } else {
            state.pending = Some((*i, listing.open_lag));
        }
        Ok(())
    }

    async fn hover(&self, handle: &FakeHandle) -> Result<(), PageError> {
        self.state.lock().unwrap().hovered = Some(handle.clone());
        Ok(())
    }
}

/// Sink that keeps every accepted collection in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub accepted: Vec<(String, ResultCollection)>,
    pub fail: bool,
}

impl OutputSink for RecordingSink {
    fn accept(&mut self, term: &str, results: &ResultCollection) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Io {
                path: "/nowhere".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.accepted.push((term.to_string(), results.clone()));
        Ok(())
    }
}
