//! hopcrawl: a bounded, domain-scoped, multi-hop crawler
//!
//! This crate renders pages with a headless browser, follows links breadth-first
//! up to a hop limit while staying on the starter hosts, and persists every
//! rendered page under a tenant-scoped location for a downstream indexing stage.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), hopcrawl::CrawlError> {
//! let result = hopcrawl::crawl("acme", &["https://example.com/"], 1).await?;
//! for page in result.pages() {
//!     println!("{} (depth {}) -> {}", page.url, page.depth, page.content_ref);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for hopcrawl operations
///
/// Only pre-flight failures surface through this type from a crawl. Failures
/// scoped to a single page are recorded in the [`crawler::CrawlResult`] instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for hopcrawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    crawl, load_documents, CancellationToken, Coordinator, CrawlFailure, CrawlRequest,
    CrawlResult, CrawlStatus, Document, FailureKind, PageRecord,
};
pub use render::{RenderError, RenderedPage, Renderer};
pub use storage::{ContentRef, FsPageStore, PageStore, StorageError};
pub use url::{normalize_url, AllowList, VisitedKey};
