use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use sitelink_core::crawl::{CrawlOptions, execute_crawl};
use sitelink_core::report::{CrawlSummary, generate_json_report, generate_text_report, save_report};
use sitelink_core::sitemap::{self, SitemapError};
use sitelink_scanner::DEFAULT_MAX_DEPTH;
use sitelink_scanner::fetcher::DEFAULT_TIMEOUT_SECS;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Level;
use url::Url;

/// Everything the command line decides about a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Url,
    pub depth: usize,
    pub domain: Option<String>,
    pub timeout_secs: u64,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub quiet: bool,
    pub verbose: bool,
}

impl RunConfig {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<Url>("url")
            .cloned()
            .ok_or_else(|| anyhow!("--url is required"))?;

        Ok(Self {
            url,
            depth: matches
                .get_one::<usize>("depth")
                .copied()
                .unwrap_or(DEFAULT_MAX_DEPTH),
            domain: matches.get_one::<String>("domain").cloned(),
            timeout_secs: matches
                .get_one::<u64>("timeout")
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            output: matches.get_one::<PathBuf>("output").map(|p| expand_path(p)),
            report: matches.get_one::<PathBuf>("report").map(|p| expand_path(p)),
            quiet: matches.get_flag("quiet"),
            verbose: matches.get_flag("verbose"),
        })
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            url: self.url.as_str().to_string(),
            max_depth: self.depth,
            domain: self.domain.clone(),
            timeout_secs: self.timeout_secs,
            show_progress_bars: !self.quiet,
        }
    }

    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

/// Expands a leading `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Logs go to stderr; stdout is reserved for the sitemap.
pub fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Writes the sitemap to `output`, or to stdout when no path is given.
pub fn write_sitemap(xml: &str, output: Option<&Path>) -> Result<(), SitemapError> {
    match output {
        Some(path) => sitemap::save_sitemap(xml, path),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

pub async fn handle_crawl(config: &RunConfig) -> Result<()> {
    if !config.quiet {
        eprintln!(
            "{} Mapping {} (depth {})",
            "→".blue(),
            config.url.as_str().bright_white(),
            config.depth
        );
    }

    let run = execute_crawl(config.crawl_options())
        .await
        .with_context(|| format!("Failed to crawl {}", config.url))?;

    let xml = sitemap::emit(run.outcome.urls.iter().cloned())
        .context("Failed to serialize sitemap")?;
    write_sitemap(&xml, config.output.as_deref()).context("Failed to write sitemap")?;

    let summary = CrawlSummary::from_run(&run);
    if !config.quiet {
        eprint!("{}", generate_text_report(&summary));
        if let Some(ref path) = config.output {
            eprintln!("{} Sitemap written to {}", "✓".green().bold(), path.display());
        }
    }

    if let Some(ref path) = config.report {
        let json = generate_json_report(&summary).context("Failed to serialize crawl report")?;
        save_report(&json, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(())
}
