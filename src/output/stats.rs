//! Statistics derived from a finished crawl
//!
//! This module summarizes a [`CrawlResult`] for display; it never touches
//! storage.

use crate::crawler::{CrawlResult, CrawlStatus, FailureKind};
use std::collections::BTreeMap;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    pub tenant: String,
    pub status: CrawlStatus,
    pub elapsed: Duration,

    /// Pages rendered and stored
    pub pages_stored: usize,

    /// Total stored bytes
    pub bytes_stored: u64,

    /// Stored pages per hop distance
    pub pages_by_depth: BTreeMap<u32, usize>,

    /// Skipped pages per failure category
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
}

impl CrawlStatistics {
    pub fn from_result(result: &CrawlResult) -> Self {
        let mut pages_by_depth = BTreeMap::new();
        for page in result.pages() {
            *pages_by_depth.entry(page.depth).or_insert(0) += 1;
        }

        let mut failures_by_kind = BTreeMap::new();
        for failure in result.failures() {
            *failures_by_kind.entry(failure.kind).or_insert(0) += 1;
        }

        Self {
            tenant: result.tenant().to_string(),
            status: result.status(),
            elapsed: result.elapsed(),
            pages_stored: result.pages().len(),
            bytes_stored: result.pages().iter().map(|p| p.size).sum(),
            pages_by_depth,
            failures_by_kind,
        }
    }

    pub fn total_failures(&self) -> usize {
        self.failures_by_kind.values().sum()
    }

    /// Stored pages as a share of everything attempted, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_stored + self.total_failures();
        if attempted == 0 {
            0.0
        } else {
            self.pages_stored as f64 / attempted as f64 * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Tenant: {}", stats.tenant);
    println!("  Status: {}", stats.status);
    println!("  Duration: {:.1}s", stats.elapsed.as_secs_f64());
    println!("  Pages stored: {}", stats.pages_stored);
    println!("  Bytes stored: {}", stats.bytes_stored);
    println!();

    if !stats.pages_by_depth.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in &stats.pages_by_depth {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.failures_by_kind.is_empty() {
        println!("Failures:");
        let mut counts: Vec<_> = stats.failures_by_kind.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages stored)",
        stats.success_rate(),
        stats.pages_stored,
        stats.pages_stored + stats.total_failures()
    );

    if stats.status.is_partial() {
        println!("Note: the crawl did not finish; results are partial");
    }
}
