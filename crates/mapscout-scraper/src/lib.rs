pub mod batch;
pub mod cancel;
#[cfg(feature = "browser")]
pub mod chrome;
pub mod collect;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod output;
pub mod page;
pub mod selectors;

pub use batch::{BatchOptions, BatchReport, BatchRunner, TermReport};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
#[cfg(feature = "browser")]
pub use chrome::{BrowserOptions, ChromeHandle, ChromePage, ChromeSession};
pub use collect::{collect, CollectOptions, Collected, StabilityTracker, Termination};
pub use error::ScraperError;
pub use extract::{extract, ExtractOptions};
pub use normalize::{
    parse_coordinates, parse_rating, parse_review_count, resolve_reviews, CoordinateError, Rating,
};
pub use output::{FileSink, NullSink, OutputFormat, OutputSink, SinkError};
pub use page::{PageContext, PageError};
pub use selectors::Selectors;
