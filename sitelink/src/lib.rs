pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{RunConfig, expand_path, handle_crawl, init_tracing, write_sitemap};
