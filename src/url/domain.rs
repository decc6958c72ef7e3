use std::collections::BTreeSet;
use url::Url;

/// Extracts the host from a URL, ignoring any port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use hopcrawl::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// The set of hosts a crawl may visit
///
/// Built once from the starter URLs of a request. Membership is exact: a
/// subdomain of an allowed host is not itself allowed unless it was a starter
/// host too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    hosts: BTreeSet<String>,
}

impl AllowList {
    /// Builds the allow-list from the hosts of the given starter URLs
    pub fn from_starters<'a, I>(starters: I) -> Self
    where
        I: IntoIterator<Item = &'a Url>,
    {
        let hosts = starters.into_iter().filter_map(extract_host).collect();
        Self { hosts }
    }

    /// Returns true if the URL's host is one of the allowed hosts
    pub fn is_allowed(&self, url: &Url) -> bool {
        extract_host(url).is_some_and(|host| self.hosts.contains(&host))
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_lowercase())
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Free-function form of [`AllowList::is_allowed`]
pub fn is_allowed(url: &Url, allowed: &AllowList) -> bool {
    allowed.is_allowed(url)
}
