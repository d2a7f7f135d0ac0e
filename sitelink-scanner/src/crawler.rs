use crate::error::{Result, ScanError};
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::links;
use crate::result::{CrawlOutcome, CrawlResult};
use crate::visited::{TaskGuard, VisitedSet};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Called with (url, depth budget) when a task starts fetching.
pub type ProgressCallback = Arc<dyn Fn(String, usize) + Send + Sync>;

pub struct Crawler {
    fetcher: Fetcher,
    max_depth: usize,
    base_domain: Option<String>,
    progress_callback: Option<ProgressCallback>,
}

/// State shared by every task of one crawl. Built fresh per [`Crawler::crawl`].
struct Traversal {
    fetcher: Fetcher,
    domain: String,
    visited: VisitedSet,
    results: Mutex<Vec<CrawlResult>>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_config(&FetcherConfig::default())
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Self::with_config(&FetcherConfig {
            timeout_secs,
            ..FetcherConfig::default()
        })
    }

    pub fn with_config(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            max_depth: DEFAULT_MAX_DEPTH,
            base_domain: None,
            progress_callback: None,
        })
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Overrides the prefix that decides whether a link is in scope.
    pub fn with_base_domain(mut self, domain: String) -> Self {
        self.base_domain = Some(domain);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The `scheme://host[:port]` prefix of `root_url`.
    pub fn base_domain(root_url: &str) -> Result<String> {
        let parsed = Url::parse(root_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root_url, e)))?;

        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(ScanError::InvalidUrl(format!(
                "{}: URL has no host",
                root_url
            )));
        }

        Ok(origin.ascii_serialization())
    }

    /// Crawls from `root_url` and blocks until every spawned task is done.
    ///
    /// The root is recorded as visited before anything is fetched, so links
    /// back to it never start a second task. Page failures are logged and kept
    /// in the outcome; they never fail the crawl.
    pub async fn crawl(&self, root_url: &str) -> Result<CrawlOutcome> {
        let domain = match &self.base_domain {
            Some(domain) => {
                Url::parse(root_url)
                    .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root_url, e)))?;
                domain.clone()
            }
            None => Self::base_domain(root_url)?,
        };

        info!(
            "Starting crawl of {} (domain {}, max depth {})",
            root_url, domain, self.max_depth
        );

        let traversal = Arc::new(Traversal {
            fetcher: self.fetcher.clone(),
            domain: domain.clone(),
            visited: VisitedSet::new(),
            results: Mutex::new(Vec::new()),
            progress_callback: self.progress_callback.clone(),
        });

        traversal.visited.seed(root_url);
        if self.max_depth > 0 {
            traversal.visited.task_started();
            spawn_task(traversal.clone(), root_url.to_string(), self.max_depth);
        }

        traversal.visited.wait_idle().await;

        let urls = traversal.visited.snapshot();
        let duplicate_sightings = traversal.visited.duplicate_sightings();
        let results = std::mem::take(&mut *traversal.results.lock().await);

        info!(
            "Crawl complete. Visited {} URLs, fetched {} pages",
            urls.len(),
            results.len()
        );

        Ok(CrawlOutcome {
            root: root_url.to_string(),
            domain,
            max_depth: self.max_depth,
            urls,
            results,
            duplicate_sightings,
        })
    }
}

fn spawn_task(traversal: Arc<Traversal>, url: String, depth: usize) {
    tokio::spawn(visit(traversal, url, depth));
}

/// One traversal task: fetch, expand, dispatch first sightings at `depth - 1`.
///
/// The caller has already counted this task as outstanding; the guard settles
/// that count however the task ends.
fn visit(traversal: Arc<Traversal>, url: String, depth: usize) -> BoxFuture<'static, ()> {
    async move {
        let _guard = TaskGuard::new(&traversal.visited);
        if depth == 0 {
            return;
        }
        let budget = depth - 1;

        if let Some(ref callback) = traversal.progress_callback {
            callback(url.clone(), depth);
        }

        let result = match traversal.expand(&url, depth).await {
            Ok((mut result, candidates)) => {
                for candidate in candidates {
                    // Leaves (budget 0) are recorded but never get a task.
                    if traversal.visited.claim(&candidate, budget > 0) {
                        result.links_claimed += 1;
                        if budget > 0 {
                            debug!("Dispatching {} at depth {}", candidate, budget);
                            spawn_task(traversal.clone(), candidate, budget);
                        }
                    }
                }
                result
            }
            Err(e) => {
                warn!("Crawl error for {}: {}", url, e);
                let mut result = CrawlResult::with_error(url.clone(), depth, e.to_string());
                if let ScanError::Status { status, .. } = e {
                    result.status_code = status.as_u16();
                }
                result
            }
        };

        traversal.results.lock().await.push(result);
    }
    .boxed()
}

impl Traversal {
    /// Fetches `url` and returns its in-domain links.
    async fn expand(&self, url: &str, depth: usize) -> Result<(CrawlResult, Vec<String>)> {
        let start = Instant::now();
        let response = self.fetcher.fetch(url).await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;
        let response_time = start.elapsed();

        let hrefs = links::extract_links(&body)?;
        let candidates = links::normalize(&hrefs, &self.domain);
        debug!(
            "{}: {} anchors, {} in domain",
            url,
            hrefs.len(),
            candidates.len()
        );

        let mut result = CrawlResult::new(url.to_string(), depth);
        result.status_code = status_code;
        result.response_time = response_time;
        result.anchors_found = hrefs.len();
        result.links_found = candidates.len();

        Ok((result, candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, path_regex},
    };

    fn html_page(hrefs: &[&str]) -> String {
        let mut html = String::from("<html><body>");
        for href in hrefs {
            html.push_str(&format!(r#"<a href="{}">link</a>"#, href));
        }
        html.push_str("</body></html>");
        html
    }

    async fn mount_page(server: &MockServer, at: &str, hrefs: &[&str], times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html_page(hrefs)),
            )
            .expect(times)
            .mount(server)
            .await;
    }

    fn set(urls: &[String]) -> BTreeSet<String> {
        urls.iter().cloned().collect()
    }

    #[tokio::test]
    async fn test_back_edge_and_off_domain_link() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/a", "http://other.test/z"], 1).await;
        mount_page(&mock_server, "/a", &["/", "/b"], 1).await;
        // /b sits at depth budget 0: recorded, never fetched.
        mount_page(&mock_server, "/b", &[], 0).await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap().with_max_depth(2);
        let outcome = crawler.crawl(&root).await.unwrap();

        let uri = mock_server.uri();
        assert_eq!(
            outcome.urls,
            set(&[format!("{uri}/"), format!("{uri}/a"), format!("{uri}/b")])
        );
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.domain, uri);
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_nothing() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/a"], 0).await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap().with_max_depth(0);
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.urls, set(&[root]));
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_depth_one_records_children_without_fetching() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/a", "/b"], 1).await;
        mount_page(&mock_server, "/a", &[], 0).await;
        mount_page(&mock_server, "/b", &[], 0).await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap().with_max_depth(1);
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.urls.len(), 3);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].links_claimed, 2);
    }

    #[tokio::test]
    async fn test_only_off_domain_links_yields_root() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            &["http://other.test/", "relative.html", "", "mailto:a@b.test"],
            1,
        )
        .await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap();
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.urls, set(&[root]));
        assert_eq!(outcome.results[0].anchors_found, 4);
        assert_eq!(outcome.results[0].links_found, 0);
    }

    #[tokio::test]
    async fn test_failed_pages_do_not_fail_the_crawl() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/broken", "/ok"], 1).await;
        mount_page(&mock_server, "/ok", &["/deeper"], 1).await;
        mount_page(&mock_server, "/deeper", &[], 1).await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap().with_max_depth(3);
        let outcome = crawler.crawl(&root).await.unwrap();

        let uri = mock_server.uri();
        assert!(outcome.urls.contains(&format!("{uri}/broken")));
        assert!(outcome.urls.contains(&format!("{uri}/deeper")));

        let failures: Vec<_> = outcome.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status_code, 500);
        assert_eq!(outcome.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_root_yields_root_only() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap();
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.urls, set(&[root]));
        assert_eq!(outcome.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_root_url() {
        let crawler = Crawler::new().unwrap();

        assert!(matches!(
            crawler.crawl("").await,
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            crawler.crawl("not a url").await,
            Err(ScanError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_base_domain_is_origin() {
        assert_eq!(
            Crawler::base_domain("http://x.test/some/page?q=1").unwrap(),
            "http://x.test"
        );
        assert_eq!(
            Crawler::base_domain("https://x.test:8443/").unwrap(),
            "https://x.test:8443"
        );
        assert!(Crawler::base_domain("mailto:someone@x.test").is_err());
    }

    #[tokio::test]
    async fn test_base_domain_override() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();
        let docs = format!("{uri}/docs");
        let in_scope = format!("{docs}/a");
        let out_of_scope = format!("{uri}/blog");
        mount_page(&mock_server, "/docs/", &[&in_scope, &out_of_scope], 1).await;
        mount_page(&mock_server, "/docs/a", &[], 1).await;
        mount_page(&mock_server, "/blog", &[], 0).await;

        let root = format!("{docs}/");
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(2)
            .with_base_domain(docs.clone());
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.urls, set(&[root, format!("{docs}/a")]));
    }

    #[tokio::test]
    async fn test_each_crawl_starts_fresh() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/a"], 2).await;
        mount_page(&mock_server, "/a", &[], 2).await;

        let root = format!("{}/", mock_server.uri());
        let crawler = Crawler::new().unwrap().with_max_depth(2);
        let first = crawler.crawl(&root).await.unwrap();
        let second = crawler.crawl(&root).await.unwrap();

        assert_eq!(first.urls, second.urls);
        assert_eq!(second.results.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_fetch() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", &["/a", "/b"], 1).await;
        mount_page(&mock_server, "/a", &["/b"], 1).await;
        mount_page(&mock_server, "/b", &["/a"], 1).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(3)
            .with_progress_callback(Arc::new(move |_url, _depth| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }));

        let root = format!("{}/", mock_server.uri());
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // /a -> /b and /b -> /a are both repeat sightings.
        assert_eq!(outcome.duplicate_sightings, 2);
    }

    /// Many sibling pages racing to discover one target dispatch it once.
    /// Requests are multiplexed over a single HTTP/2 connection so the
    /// siblings don't each hold a socket.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_shared_target_dispatched_once() {
        const PAGES: usize = 1000;
        let mock_server = MockServer::start().await;

        let pages: Vec<String> = (0..PAGES).map(|i| format!("/p{}", i)).collect();
        let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        mount_page(&mock_server, "/", &page_refs, 1).await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/p\d+$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html_page(&["/target", "/"])),
            )
            .expect(PAGES as u64)
            .mount(&mock_server)
            .await;
        mount_page(&mock_server, "/target", &["/"], 1).await;

        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();
        let crawler = Crawler {
            fetcher: Fetcher::from_client(client),
            max_depth: 3,
            base_domain: None,
            progress_callback: None,
        };
        let root = format!("{}/", mock_server.uri());
        let outcome = crawler.crawl(&root).await.unwrap();

        assert_eq!(outcome.failures().count(), 0);
        assert_eq!(outcome.urls.len(), PAGES + 2);
        let target = format!("{}/target", mock_server.uri());
        let target_tasks = outcome.results.iter().filter(|r| r.url == target).count();
        assert_eq!(target_tasks, 1);

        let claimed: usize = outcome.results.iter().map(|r| r.links_claimed).sum();
        assert_eq!(claimed, PAGES + 1);
    }
}
