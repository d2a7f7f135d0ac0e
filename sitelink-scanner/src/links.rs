use crate::error::{Result, ScanError};
use scraper::{Html, Selector};

/// Collects the raw `href` of every anchor, in document order.
///
/// html5ever recovers from malformed markup, so a broken document still yields
/// whatever anchors it managed to build.
pub fn extract_links(html: &str) -> Result<Vec<String>> {
    let selector = Selector::parse("a[href]").map_err(|e| ScanError::Parse(e.to_string()))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect())
}

/// Keeps the hrefs that belong to `domain`, rewriting root-relative ones.
///
/// Pure string matching: `http://x.test/a` and `http://x.test/a/` stay two
/// different URLs.
pub fn normalize<I, S>(hrefs: I, domain: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hrefs
        .into_iter()
        .filter_map(|href| normalize_one(href.as_ref(), domain))
        .collect()
}

fn normalize_one(href: &str, domain: &str) -> Option<String> {
    if href.is_empty() {
        None
    } else if href.starts_with('/') {
        Some(format!("{}{}", domain, href))
    } else if within_domain(href, domain) {
        Some(href.to_string())
    } else {
        None
    }
}

/// `domain` must be followed by a URL delimiter, so `http://x.test` does not
/// admit `http://x.test.other/` or `http://x.test:9999/`.
fn within_domain(href: &str, domain: &str) -> bool {
    match href.strip_prefix(domain) {
        Some(rest) => {
            domain.ends_with('/')
                || rest.is_empty()
                || rest.starts_with(['/', '?', '#'])
        }
        None => false,
    }
}
