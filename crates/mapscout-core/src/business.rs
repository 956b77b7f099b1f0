//! Scraped business records.
//!
//! Every optional field uses `Option` for "not found". An empty string is
//! never used as a stand-in for absence, and `Some(0)` reviews is a real
//! parsed state distinct from `None`.

use serde::{Deserialize, Serialize};

/// One business listing scraped from the map search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    /// Display name. Falls back to `""` when neither the listing heading nor
    /// the accessible label yields text.
    pub name: String,
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    /// Number of reviews. `Some(0)` when the listing says it has none.
    pub reviews_count: Option<u32>,
    /// Star rating in `[0.0, 5.0]`. `Some(0.0)` when the listing has no reviews.
    pub reviews_average: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Business {
    /// Creates a record with only its coordinates set.
    ///
    /// The extractor fills in the remaining fields one by one before the
    /// record is appended to a [`ResultCollection`].
    #[must_use]
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            name: String::new(),
            address: None,
            website: None,
            phone_number: None,
            reviews_count: None,
            reviews_average: None,
            latitude,
            longitude,
        }
    }
}

/// Ordered businesses scraped for a single search term.
///
/// Duplicates surfaced by repeated scroll passes are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCollection {
    businesses: Vec<Business>,
}

impl ResultCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finished record. Records are never modified after this.
    pub fn push(&mut self, business: Business) {
        self.businesses.push(business);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.businesses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.businesses.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Business> {
        self.businesses.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Business] {
        &self.businesses
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Business> {
        self.businesses
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = &'a Business;
    type IntoIter = std::slice::Iter<'a, Business>;

    fn into_iter(self) -> Self::IntoIter {
        self.businesses.iter()
    }
}

impl FromIterator<Business> for ResultCollection {
    fn from_iter<I: IntoIterator<Item = Business>>(iter: I) -> Self {
        Self {
            businesses: iter.into_iter().collect(),
        }
    }
}
