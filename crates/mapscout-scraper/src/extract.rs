//! Per-listing extraction: open a listing and read its detail fields.
//!
//! Each field is looked up independently. A lookup that fails for anything
//! short of a capability error leaves that field `None` and extraction moves
//! on, so one odd listing costs at most a few blank cells.

use std::time::Duration;

use mapscout_core::Business;

use crate::error::ScraperError;
use crate::normalize::{parse_coordinates, resolve_reviews, says_no_reviews};
use crate::page::{PageContext, PageError};
use crate::selectors::Selectors;

/// Timeouts applied while reading one listing.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Upper bound on the wait for the detail view after clicking a
    /// listing, and on the settle wait that follows.
    pub settle_timeout: Duration,
    /// Upper bound on each inner-text read.
    pub text_timeout: Duration,
    /// Delay between URL checks while the detail view switches.
    pub poll_interval: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(2),
            text_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Opens `handle` and builds a [`Business`] from the detail view.
///
/// # Errors
///
/// - [`ScraperError::Capability`] when the page itself fails; the caller
///   should abandon the current search term.
/// - [`ScraperError::Extraction`] when the listing cannot be opened, or
///   [`ScraperError::Coordinates`] when the detail view has no usable
///   coordinates; either way the caller should skip the listing.
pub async fn extract<P>(
    page: &P,
    handle: &P::Handle,
    selectors: &Selectors,
    options: &ExtractOptions,
) -> Result<Business, ScraperError>
where
    P: PageContext + ?Sized,
{
    let name = listing_name(page, handle, selectors, options).await?;
    let item = if name.is_empty() { "<unnamed>" } else { name.as_str() };

    let before = page
        .current_url()
        .await
        .map_err(|e| item_failure(item, "read current url", e))?;
    page.click(handle)
        .await
        .map_err(|e| item_failure(item, "open listing", e))?;
    let url = wait_for_detail(page, item, &before, options).await?;
    page.wait_for_idle(options.settle_timeout).await?;

    let (latitude, longitude) = parse_coordinates(&url)?;

    let mut business = Business::at(latitude, longitude);
    business.name.clone_from(&name);

    business.address = soft(
        item,
        "address",
        first_text(page, &selectors.address, options.text_timeout).await,
    )?;
    business.website = soft(
        item,
        "website",
        first_text(page, &selectors.website, options.text_timeout).await,
    )?;
    business.phone_number = soft(
        item,
        "phone_number",
        first_text(page, &selectors.phone, options.text_timeout).await,
    )?;

    let mut rating_label = soft(
        item,
        "reviews_average",
        first_attribute(page, &selectors.reviews_average, &selectors.rating_attribute).await,
    )?;
    if rating_label.is_none() {
        // Unreviewed places have no rating widget; the listing card says so instead.
        let card = soft(
            item,
            "listing_text",
            page.inner_text(handle, options.text_timeout).await.map(Some),
        )?;
        rating_label = card.filter(|text| says_no_reviews(text));
    }
    let count_text = soft(
        item,
        "reviews_count",
        first_text(page, &selectors.review_count, options.text_timeout).await,
    )?;

    let (reviews_average, reviews_count) =
        resolve_reviews(rating_label.as_deref(), count_text.as_deref());
    business.reviews_average = reviews_average;
    business.reviews_count = reviews_count;

    Ok(business)
}

/// Name fallback chain: listing heading text, then the listing's accessible
/// label, then `""`.
async fn listing_name<P>(
    page: &P,
    handle: &P::Handle,
    selectors: &Selectors,
    options: &ExtractOptions,
) -> Result<String, ScraperError>
where
    P: PageContext + ?Sized,
{
    let heading = match page.locate(Some(handle), &selectors.listing_heading).await {
        Ok(found) => match found.first() {
            Some(node) => soft(
                "<listing>",
                "name",
                page.inner_text(node, options.text_timeout).await.map(Some),
            )?,
            None => None,
        },
        Err(e) => soft::<String>("<listing>", "name", Err(e))?,
    };
    if let Some(text) = heading.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        return Ok(text);
    }

    let label = soft(
        "<listing>",
        "name",
        page.attribute(handle, &selectors.name_attribute).await,
    )?;
    Ok(label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_default())
}

/// Waits for the URL to move off `before` onto a place with coordinates, so
/// the detail fields read next belong to the clicked listing. A URL that
/// changed without coordinates is returned once the wait runs out; one that
/// never changed means the listing did not open.
async fn wait_for_detail<P>(
    page: &P,
    item: &str,
    before: &str,
    options: &ExtractOptions,
) -> Result<String, ScraperError>
where
    P: PageContext + ?Sized,
{
    let deadline = tokio::time::Instant::now() + options.settle_timeout;
    loop {
        let url = page
            .current_url()
            .await
            .map_err(|e| item_failure(item, "read current url", e))?;
        let changed = url != before;
        if changed && url.contains("/@") {
            return Ok(url);
        }
        if tokio::time::Instant::now() >= deadline {
            if changed {
                return Ok(url);
            }
            return Err(ScraperError::Extraction {
                item: item.to_string(),
                reason: "detail view did not switch to the clicked listing".to_string(),
            });
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Inner text of the first element matching `selector`, trimmed; `None` when
/// nothing matches or the text is blank.
async fn first_text<P>(
    page: &P,
    selector: &str,
    timeout: Duration,
) -> Result<Option<String>, PageError>
where
    P: PageContext + ?Sized,
{
    if page.count(None, selector).await? == 0 {
        return Ok(None);
    }
    let Some(first) = page.locate(None, selector).await?.into_iter().next() else {
        return Ok(None);
    };
    let text = page.inner_text(&first, timeout).await?;
    Ok(non_blank(text))
}

async fn first_attribute<P>(
    page: &P,
    selector: &str,
    attribute: &str,
) -> Result<Option<String>, PageError>
where
    P: PageContext + ?Sized,
{
    if page.count(None, selector).await? == 0 {
        return Ok(None);
    }
    let Some(first) = page.locate(None, selector).await?.into_iter().next() else {
        return Ok(None);
    };
    Ok(page.attribute(&first, attribute).await?.and_then(non_blank))
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Downgrades a non-capability lookup failure to "field absent".
fn soft<T>(
    item: &str,
    field: &'static str,
    result: Result<Option<T>, PageError>,
) -> Result<Option<T>, ScraperError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_capability() => Err(ScraperError::Capability(e)),
        Err(e) => {
            tracing::debug!(item, field, error = %e, "field lookup failed; leaving blank");
            Ok(None)
        }
    }
}

fn item_failure(item: &str, step: &str, error: PageError) -> ScraperError {
    if error.is_capability() {
        ScraperError::Capability(error)
    } else {
        ScraperError::Extraction {
            item: item.to_string(),
            reason: format!("{step}: {error}"),
        }
    }
}
