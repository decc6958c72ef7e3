//! Output module for reporting crawl results
//!
//! This module handles:
//! - Summarizing a finished crawl into statistics
//! - Printing per-page lines and summaries for the CLI

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics};

use crate::crawler::CrawlResult;

/// Prints one line per stored page and per failure
pub fn print_pages(result: &CrawlResult) {
    for page in result.pages() {
        println!("{}\t{}\t{}", page.depth, page.url, page.content_ref);
    }
    for failure in result.failures() {
        println!(
            "FAILED\t{}\t{}\t{}",
            failure.kind, failure.url, failure.message
        );
    }
}
