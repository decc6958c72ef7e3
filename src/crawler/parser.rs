//! Link extraction from rendered HTML
//!
//! Extraction is split in two so renderers can report what the page contains
//! without knowing where it will be resolved:
//! - [`extract_raw_links`] collects `href` values as written in the markup
//! - [`resolve_links`] turns them into absolute http(s) URLs against the
//!   page's final URL
//!
//! Only `<a href>` elements are considered. Anchors carrying a `download`
//! attribute point at files, not pages, and are skipped. `rel="nofollow"` is
//! ignored; those links are followed like any other.

use scraper::{Html, Selector};
use url::Url;

/// Collects raw `href` values of every anchor, in document order
///
/// Values are trimmed but otherwise untouched; empty ones are dropped.
///
/// # Example
///
/// ```
/// use hopcrawl::crawler::extract_raw_links;
///
/// let html = r#"<a href="/a">A</a><a href=" b ">B</a><a>none</a>"#;
/// assert_eq!(extract_raw_links(html), vec!["/a", "b"]);
/// ```
pub fn extract_raw_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves raw hrefs against `base`, keeping only followable links
pub fn resolve_links(raw: &[String], base: &Url) -> Vec<Url> {
    raw.iter().filter_map(|href| resolve_link(href, base)).collect()
}

/// Resolves a single href to an absolute URL
///
/// Returns `None` for links that can never be crawled:
/// - `javascript:`, `mailto:`, `tel:` and `data:` targets
/// - same-page fragments (`#top`)
/// - anything that does not resolve to http or https
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Extracts and resolves links in one pass
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    resolve_links(&extract_raw_links(html), base)
}
