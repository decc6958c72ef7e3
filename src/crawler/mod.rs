//! Crawler module for bounded, multi-hop crawls
//!
//! This module contains the core crawling logic, including:
//! - The shared frontier and visited set workers coordinate through
//! - HTML link extraction and resolution
//! - Overall crawl coordination, cancellation and result assembly

mod coordinator;
mod frontier;
mod parser;
mod types;
mod visited;

pub use tokio_util::sync::CancellationToken;
pub use coordinator::{crawl, crawl_with_config, load_documents, Coordinator};
pub use frontier::{Frontier, FrontierEntry, Lease, Pop};
pub use parser::{extract_links, extract_raw_links, resolve_link, resolve_links};
pub use types::{
    CrawlFailure, CrawlRequest, CrawlResult, CrawlStatus, Document, FailureKind, PageRecord,
};
pub use visited::VisitedSet;
