//! Values exchanged between the coordinator and its callers

use crate::render::RenderError;
use crate::storage::{ContentRef, StorageError};
use crate::url::AllowList;
use crate::UrlError;
use std::fmt;
use std::time::Duration;
use url::Url;

/// One crawl to perform
///
/// Immutable for the lifetime of the crawl. The allow-list is derived from the
/// starter URLs, see [`CrawlRequest::allow_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Isolation boundary for stored output
    pub tenant: String,
    /// Starter URLs in caller order
    pub starter_urls: Vec<String>,
    /// Link-following budget; 0 renders the starters only
    pub hops: u32,
}

impl CrawlRequest {
    pub fn new<I>(tenant: impl Into<String>, starter_urls: I, hops: u32) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            tenant: tenant.into(),
            starter_urls: starter_urls
                .into_iter()
                .map(|u| u.as_ref().trim().to_string())
                .collect(),
            hops,
        }
    }

    /// Hosts of every parseable starter URL
    pub fn allow_list(&self) -> AllowList {
        let parsed: Vec<Url> = self
            .starter_urls
            .iter()
            .filter_map(|u| Url::parse(u).ok())
            .collect();
        AllowList::from_starters(&parsed)
    }
}

/// A successfully rendered and persisted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// URL as it was admitted (not the normalized key)
    pub url: String,
    /// Hops from the nearest starter URL
    pub depth: u32,
    /// Where the rendered HTML was stored
    pub content_ref: ContentRef,
    /// Hex SHA-256 of the stored bytes
    pub content_hash: Option<String>,
    /// Stored size in bytes
    pub size: u64,
}

/// Category of a per-page failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    /// Malformed starter or discovered URL
    InvalidUrl,
    /// Timeout, bad status or network error while rendering
    Fetch,
    /// Storage write failure
    Persistence,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::Fetch => "fetch_failure",
            Self::Persistence => "persistence_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page that was skipped, kept for observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlFailure {
    pub url: String,
    pub depth: u32,
    pub kind: FailureKind,
    pub message: String,
}

impl CrawlFailure {
    pub fn invalid_url(url: &str, depth: u32, error: &UrlError) -> Self {
        Self {
            url: url.to_string(),
            depth,
            kind: FailureKind::InvalidUrl,
            message: error.to_string(),
        }
    }

    pub fn fetch(url: &Url, depth: u32, error: &RenderError) -> Self {
        Self {
            url: url.to_string(),
            depth,
            kind: FailureKind::Fetch,
            message: error.to_string(),
        }
    }

    pub fn persistence(url: &Url, depth: u32, error: &StorageError) -> Self {
        Self {
            url: url.to_string(),
            depth,
            kind: FailureKind::Persistence,
            message: error.to_string(),
        }
    }
}

/// How a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// The frontier drained
    Completed,
    /// The caller cancelled; results are partial
    Aborted,
    /// The configured wall-clock bound elapsed; results are partial
    TimedOut,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one crawl produced
///
/// Page order follows completion order across workers and carries no meaning.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub(crate) tenant: String,
    pub(crate) pages: Vec<PageRecord>,
    pub(crate) failures: Vec<CrawlFailure>,
    pub(crate) status: CrawlStatus,
    pub(crate) elapsed: Duration,
}

impl CrawlResult {
    pub(crate) fn empty(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            pages: Vec::new(),
            failures: Vec::new(),
            status: CrawlStatus::Completed,
            elapsed: Duration::ZERO,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<PageRecord> {
        self.pages
    }

    pub fn failures(&self) -> &[CrawlFailure] {
        &self.failures
    }

    pub fn status(&self) -> CrawlStatus {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// A crawled page resolved to its text, ready for indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub tenant: String,
    pub depth: u32,
    pub content: String,
}
