use thiserror::Error;

use crate::normalize::CoordinateError;
use crate::output::SinkError;
use crate::page::PageError;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// The page context failed; fatal for the current search term.
    #[error("browser capability failure: {0}")]
    Capability(#[from] PageError),

    /// One listing could not be turned into a record; the listing is skipped.
    #[error("extraction failed for listing {item}: {reason}")]
    Extraction { item: String, reason: String },

    #[error("coordinates unavailable: {0}")]
    Coordinates(#[from] CoordinateError),

    #[error("output sink failed: {0}")]
    Sink(#[from] SinkError),
}

impl ScraperError {
    /// `true` when the error should abort the current search term rather than
    /// just the current listing.
    #[must_use]
    pub fn is_capability(&self) -> bool {
        match self {
            Self::Capability(e) => e.is_capability(),
            _ => false,
        }
    }
}
