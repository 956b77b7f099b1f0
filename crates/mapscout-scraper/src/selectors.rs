//! Markup contract with the maps search page.
//!
//! These XPath expressions track Google Maps' current DOM and will break
//! when it changes. They live in one struct so a caller can override them
//! without touching the extraction logic.

/// Selectors used by the collector, extractor and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub search_box: String,
    /// One match per result in the scrollable results feed.
    pub listing: String,
    /// Heading inside a listing, relative to the listing handle.
    pub listing_heading: String,
    /// Attribute on the listing handle carrying the accessible name.
    pub name_attribute: String,
    pub address: String,
    pub website: String,
    pub phone: String,
    pub review_count: String,
    /// Element whose `aria-label` holds the star rating.
    pub reviews_average: String,
    pub rating_attribute: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            search_box: r#"//input[@id="searchboxinput"]"#.to_string(),
            listing: r#"//a[contains(@href, "https://www.google.com/maps/place")]"#.to_string(),
            listing_heading: r#"/..//div[contains(@class, "fontHeadlineSmall")]"#.to_string(),
            name_attribute: "aria-label".to_string(),
            address: r#"//button[@data-item-id="address"]//div[contains(@class, "fontBodyMedium")]"#
                .to_string(),
            website: r#"//a[@data-item-id="authority"]//div[contains(@class, "fontBodyMedium")]"#
                .to_string(),
            phone: r#"//button[contains(@data-item-id, "phone:tel:")]//div[contains(@class, "fontBodyMedium")]"#
                .to_string(),
            review_count: r#"//button[@jsaction="pane.reviewChart.moreReviews"]//span"#.to_string(),
            reviews_average: r#"//div[@jsaction="pane.reviewChart.moreReviews"]//div[@role="img"]"#
                .to_string(),
            rating_attribute: "aria-label".to_string(),
        }
    }
}
