use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use sitelink_scanner::fetcher::DEFAULT_TIMEOUT_SECS;
use sitelink_scanner::{CrawlOutcome, Crawler, DEFAULT_MAX_DEPTH, ProgressCallback, ScanError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub max_depth: usize,
    /// Same-domain prefix; derived from `url` when absent.
    pub domain: Option<String>,
    pub timeout_secs: u64,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            domain: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            show_progress_bars: false,
        }
    }
}

/// A finished crawl together with its wall-clock bounds.
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub outcome: CrawlOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options
///
/// Page-level failures are part of the returned outcome; only an unusable
/// root URL or HTTP client fails the call.
pub async fn execute_crawl(options: CrawlOptions) -> Result<CrawlRun, ScanError> {
    let CrawlOptions {
        url,
        max_depth,
        domain,
        timeout_secs,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    debug!(
        "Crawl options: url={} max_depth={} domain={:?} timeout={}s",
        url, max_depth, domain, timeout_secs
    );

    let mut crawler = Crawler::with_timeout(timeout_secs)?.with_max_depth(max_depth);
    if let Some(domain) = domain {
        crawler = crawler.with_base_domain(domain);
    }

    let processed_count = Arc::new(AtomicUsize::new(0));
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        let callback: ProgressCallback = Arc::new(move |url: String, depth: usize| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Crawling... {} pages [depth {}] {}",
                count,
                depth,
                extract_url_path(&url)
            ));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let started_at = Utc::now();
    let result = crawler.crawl(&url).await;
    let finished_at = Utc::now();

    if let Some(ref pb) = progress_bar {
        if let Ok(ref outcome) = result {
            pb.println(format!(
                "Crawl complete! {} URLs discovered, {} pages fetched",
                outcome.urls.len(),
                outcome.results.len()
            ));
        }
        pb.finish_and_clear();
    }

    Ok(CrawlRun {
        outcome: result?,
        started_at,
        finished_at,
    })
}
