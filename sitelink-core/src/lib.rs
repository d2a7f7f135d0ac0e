pub mod crawl;
pub mod report;
pub mod sitemap;

pub use crawl::{CrawlOptions, CrawlRun, execute_crawl};
pub use report::CrawlSummary;
pub use sitemap::SitemapError;
