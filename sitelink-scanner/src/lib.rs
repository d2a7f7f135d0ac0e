pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod result;
pub mod visited;

pub use crawler::{Crawler, DEFAULT_MAX_DEPTH, ProgressCallback};
pub use error::ScanError;
pub use fetcher::{Fetcher, FetcherConfig};
pub use result::{CrawlOutcome, CrawlResult};
pub use visited::VisitedSet;
