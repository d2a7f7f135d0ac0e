use std::collections::BTreeSet;
use std::time::Duration;

/// Outcome of a single traversal task.
///
/// A task either expands its page (status, link counts) or fails with a
/// reason. Failures never leave the task; they are only kept here for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub url: String,
    /// Depth budget the task was started with.
    pub depth: usize,
    pub status_code: u16,
    pub response_time: Duration,
    /// Raw anchors found in the document, before filtering.
    pub anchors_found: usize,
    /// In-domain links kept by the normalizer.
    pub links_found: usize,
    /// Links this task was the first to claim.
    pub links_claimed: usize,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            status_code: 0,
            response_time: Duration::from_secs(0),
            anchors_found: 0,
            links_found: 0,
            links_claimed: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a finished crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub root: String,
    pub domain: String,
    pub max_depth: usize,
    /// The visited-set, sorted.
    pub urls: BTreeSet<String>,
    /// One entry per task that attempted a fetch, in completion order.
    pub results: Vec<CrawlResult>,
    /// Sightings of already-visited URLs.
    pub duplicate_sightings: usize,
}

impl CrawlOutcome {
    pub fn pages_fetched(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }
}
