//! Pure parsers turning listing text fragments into typed values.
//!
//! Nothing here touches the browser. Inputs are whatever the page handed back
//! (aria-labels, inner text, the current URL), which varies by locale and is
//! frequently missing, so every parser except [`parse_coordinates`] degrades
//! to `None` instead of failing.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Phrases that mean the listing has no reviews yet. Matched
/// case-insensitively anywhere in the label.
const NO_REVIEW_MARKERS: [&str; 2] = ["no reviews", "be the first to review"];

static STARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*stars?\b").expect("valid regex")
});

static LEADING_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:[.,]\d+)?)").expect("valid regex"));

// Digit groups may be separated by `,` `.` `'` or (narrow) no-break spaces.
static PAREN_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(\d{1,3}(?:[,.'\u{a0}\u{202f} ]\d{3})+|\d+)\s*\)").expect("valid regex")
});

static LEADING_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3}(?:[,.'\u{a0}\u{202f} ]\d{3})+|\d+)\b").expect("valid regex")
});

/// Outcome of reading a listing's rating label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    /// A star average in `[0.0, 5.0]`.
    Stars(f64),
    /// The listing explicitly has no reviews: pins the pair to `(0.0, 0)`.
    NoReviews,
}

/// Parses a rating aria-label such as `"4.5 stars"` or `"4,5 stars"`.
///
/// A "no reviews" / "be the first to review" phrase wins over any number in
/// the same label. Otherwise the number before a `star` marker is used,
/// falling back to the label's leading number. Values outside `[0, 5]` are
/// rejected.
#[must_use]
pub fn parse_rating(label: &str) -> Option<Rating> {
    if says_no_reviews(label) {
        return Some(Rating::NoReviews);
    }

    let raw = STARS_RE
        .captures(label)
        .or_else(|| LEADING_DECIMAL_RE.captures(label))
        .and_then(|cap| cap.get(1))?
        .as_str()
        .replace(',', ".");

    let value = raw.parse::<f64>().ok()?;
    (0.0..=5.0).contains(&value).then_some(Rating::Stars(value))
}

/// `true` when `text` contains one of the "no reviews yet" phrases.
#[must_use]
pub fn says_no_reviews(text: &str) -> bool {
    let lower = text.to_lowercase();
    NO_REVIEW_MARKERS.iter().any(|m| lower.contains(m))
}

/// Parses a review count such as `"(1,234)"` or `"1,234 reviews"`.
///
/// A parenthesized integer is preferred; a leading integer token is the
/// fallback. Grouping separators are stripped before parsing.
#[must_use]
pub fn parse_review_count(text: &str) -> Option<u32> {
    let digits: String = PAREN_COUNT_RE
        .captures(text)
        .or_else(|| LEADING_COUNT_RE.captures(text))
        .and_then(|cap| cap.get(1))?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Combines the rating label and the count text into
/// `(reviews_average, reviews_count)`.
///
/// When the rating says "no reviews", both values are pinned to zero and the
/// count text is ignored.
#[must_use]
pub fn resolve_reviews(
    rating_label: Option<&str>,
    count_text: Option<&str>,
) -> (Option<f64>, Option<u32>) {
    match rating_label.and_then(parse_rating) {
        Some(Rating::NoReviews) => (Some(0.0), Some(0)),
        Some(Rating::Stars(avg)) => (Some(avg), count_text.and_then(parse_review_count)),
        None => (None, count_text.and_then(parse_review_count)),
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("no \"/@lat,lon\" segment in {url}")]
    MissingSegment { url: String },

    #[error("malformed coordinate segment \"{segment}\": {reason}")]
    Malformed { segment: String, reason: String },

    #[error("coordinates out of range: {latitude},{longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

/// Extracts `(latitude, longitude)` from a place URL such as
/// `https://www.google.com/maps/place/X/@40.7128,-74.0060,15z/data=...`.
///
/// Reads the text between the last `/@` and the next `/` (or `?`/`#`), and
/// parses its first two comma-separated parts.
///
/// # Errors
///
/// Any failure here means the page is not showing a place detail view, so it
/// is reported rather than defaulted.
pub fn parse_coordinates(url: &str) -> Result<(f64, f64), CoordinateError> {
    let (_, after) = url
        .rsplit_once("/@")
        .ok_or_else(|| CoordinateError::MissingSegment {
            url: url.to_string(),
        })?;
    let segment = after.split(['/', '?', '#']).next().unwrap_or_default();

    let malformed = |reason: &str| CoordinateError::Malformed {
        segment: segment.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = segment.split(',').map(str::trim);
    let latitude = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| malformed("missing latitude"))?
        .parse::<f64>()
        .map_err(|e| malformed(&format!("latitude: {e}")))?;
    let longitude = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| malformed("missing longitude"))?
        .parse::<f64>()
        .map_err(|e| malformed(&format!("longitude: {e}")))?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(CoordinateError::OutOfRange {
            latitude,
            longitude,
        });
    }

    Ok((latitude, longitude))
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
