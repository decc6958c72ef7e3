//! Page store trait and error types

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("Unknown content reference: {0}")]
    UnknownReference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque handle to stored page content
///
/// Only meaningful to the store that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentRef(PathBuf);

impl ContentRef {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// What a successful write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub content_ref: ContentRef,
    /// Hex SHA-256 of the stored bytes
    pub content_hash: String,
    pub size: u64,
}

/// Durable, tenant-scoped storage for rendered pages
///
/// Implementations must be safe to call from many workers at once and must
/// never let one tenant's writes land in another tenant's namespace.
pub trait PageStore: Send + Sync {
    /// Checks that `tenant` can be stored and creates its namespace
    ///
    /// Called once before a crawl starts; an error here aborts the crawl.
    fn prepare_tenant(&self, tenant: &str) -> impl Future<Output = StorageResult<()>> + Send;

    /// Writes one page
    ///
    /// Storing the same URL again for the same tenant replaces the earlier copy.
    fn persist(
        &self,
        tenant: &str,
        url: &str,
        html: &str,
    ) -> impl Future<Output = StorageResult<StoredContent>> + Send;

    /// Reads back content written by [`persist`](Self::persist)
    fn read(&self, content_ref: &ContentRef) -> impl Future<Output = StorageResult<String>> + Send;
}

impl<S: PageStore> PageStore for Arc<S> {
    fn prepare_tenant(&self, tenant: &str) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).prepare_tenant(tenant)
    }

    fn persist(
        &self,
        tenant: &str,
        url: &str,
        html: &str,
    ) -> impl Future<Output = StorageResult<StoredContent>> + Send {
        (**self).persist(tenant, url, html)
    }

    fn read(&self, content_ref: &ContentRef) -> impl Future<Output = StorageResult<String>> + Send {
        (**self).read(content_ref)
    }
}
