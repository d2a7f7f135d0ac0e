//! Sitemap document emission.
//!
//! Produces the `urlset` format from <https://www.sitemaps.org/protocol.html>
//! with a single `loc` per entry:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>http://x.test/</loc>
//!   </url>
//! </urlset>
//! ```

use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("XML serialization error: {0}")]
    Serialize(#[from] quick_xml::errors::serialize::SeError),

    #[error("XML deserialization error: {0}")]
    Deserialize(#[from] quick_xml::errors::serialize::DeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SitemapError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "urlset")]
pub struct UrlSet {
    #[serde(rename = "@xmlns", default)]
    pub xmlns: String,

    #[serde(rename = "url", default)]
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UrlEntry {
    pub loc: String,
}

impl UrlSet {
    pub fn new<I, S>(locs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            xmlns: SITEMAP_NAMESPACE.to_string(),
            urls: locs
                .into_iter()
                .map(|loc| UrlEntry { loc: loc.into() })
                .collect(),
        }
    }

    /// Serializes with the XML declaration and two-space indentation.
    pub fn to_xml(&self) -> Result<String> {
        let mut body = String::new();
        let mut serializer = Serializer::new(&mut body);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;

        Ok(format!("{}\n{}\n", XML_HEADER, body))
    }
}

/// Builds the sitemap for `urls`, sorted and deduplicated so the same
/// visited-set always produces the same bytes.
pub fn emit<I, S>(urls: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let locs: BTreeSet<String> = urls.into_iter().map(Into::into).collect();
    UrlSet::new(locs).to_xml()
}

/// Reads the `loc` of every entry of a `urlset` document.
pub fn parse(xml: &str) -> Result<BTreeSet<String>> {
    let urlset: UrlSet = quick_xml::de::from_str(xml)?;
    Ok(urlset.urls.into_iter().map(|entry| entry.loc).collect())
}

pub fn save_sitemap(xml: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, xml)?;
    Ok(())
}
