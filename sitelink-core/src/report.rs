// Crawl summaries: human-readable text for stderr and JSON for --report

use crate::crawl::{CrawlRun, extract_url_path};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub root: String,
    pub domain: String,
    pub max_depth: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub urls_discovered: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub duplicate_sightings: usize,
    pub failures: Vec<FailureData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureData {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub error: String,
}

impl CrawlSummary {
    pub fn from_run(run: &CrawlRun) -> Self {
        let outcome = &run.outcome;
        let mut failures: Vec<FailureData> = outcome
            .failures()
            .map(|r| FailureData {
                url: r.url.clone(),
                status_code: (r.status_code != 0).then_some(r.status_code),
                error: r.error.clone().unwrap_or_default(),
            })
            .collect();
        failures.sort_by(|a, b| a.url.cmp(&b.url));

        Self {
            root: outcome.root.clone(),
            domain: outcome.domain.clone(),
            max_depth: outcome.max_depth,
            started_at: run.started_at,
            finished_at: run.finished_at,
            urls_discovered: outcome.urls.len(),
            pages_fetched: outcome.pages_fetched(),
            pages_failed: failures.len(),
            duplicate_sightings: outcome.duplicate_sightings,
            failures,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

pub fn generate_text_report(summary: &CrawlSummary) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("Root:           {}\n", summary.root));
    report.push_str(&format!("Domain:         {}\n", summary.domain));
    report.push_str(&format!("Max depth:      {}\n", summary.max_depth));
    report.push_str(&format!(
        "Duration:       {:.2}s\n",
        summary.duration_ms() as f64 / 1000.0
    ));
    report.push_str(&format!("URLs found:     {}\n", summary.urls_discovered));
    report.push_str(&format!("Pages fetched:  {}\n", summary.pages_fetched));
    report.push_str(&format!("Pages failed:   {}\n", summary.pages_failed));
    report.push_str(&format!("Repeat links:   {}\n", summary.duplicate_sightings));

    if !summary.failures.is_empty() {
        report.push('\n');
        report.push_str("Failures:\n");
        for failure in &summary.failures {
            let status = failure
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "---".to_string());
            report.push_str(&format!(
                "  {} {} {}  {}\n",
                "✗".red(),
                status.yellow(),
                extract_url_path(&failure.url),
                failure.error.dimmed()
            ));
        }
    }

    report.push_str(RULE);
    report.push('\n');
    report
}

pub fn generate_json_report(summary: &CrawlSummary) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "generator": "sitelink",
        "version": env!("CARGO_PKG_VERSION"),
        "duration_ms": summary.duration_ms(),
        "summary": summary,
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
