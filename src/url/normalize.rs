use crate::UrlError;
use std::fmt;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Canonical form of a URL, used as the dedup key of a crawl
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitedKey(String);

impl VisitedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VisitedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a URL string into its [`VisitedKey`]
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if it is not absolute, has no host, or is not HTTP(S)
/// 2. Lowercase scheme and host (done by the parser for HTTP(S))
/// 3. Strip default ports (80 for http, 443 for https)
/// 4. Normalize path:
///    - Remove dot segments
///    - Remove trailing slash (except for root /)
///    - Keep repeated slashes
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters and sort the rest
/// 7. Remove empty query string (trailing ?)
///
/// The scheme is kept as-is: `http://a.com/` and `https://a.com/` are distinct keys.
///
/// # Examples
///
/// ```
/// use hopcrawl::url::normalize_url;
///
/// let a = normalize_url("HTTPS://Example.COM:443/docs/#intro").unwrap();
/// let b = normalize_url("https://example.com/docs").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "https://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<VisitedKey, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(format!("{url_str}: {e}")))?;
    normalize(&url)
}

/// Normalizes an already parsed URL into its [`VisitedKey`]
pub fn normalize(url: &Url) -> Result<VisitedKey, UrlError> {
    let mut url = url.clone();

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Parse(format!("Failed to set host: {e}")))?;
            }
        }
        _ => return Err(UrlError::MissingHost(url.to_string())),
    }

    if url.port().is_some() && url.port() == default_port(url.scheme()) {
        // Url::parse already drops default ports; this covers hand-built URLs.
        let _ = url.set_port(None);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(VisitedKey(url.into()))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Normalizes a URL path by resolving dot segments and dropping one trailing slash
///
/// Empty segments inside the path are kept: `/a//b` and `/a/b` may be
/// different resources.
fn normalize_path(path: &str) -> String {
    let body = path.strip_prefix('/').unwrap_or(path);
    let body = body.strip_suffix('/').unwrap_or(body);

    let mut segments: Vec<&str> = Vec::new();
    for segment in body.split('/') {
        match segment {
            "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
