//! URL handling module for hopcrawl
//!
//! This module provides URL normalization (the dedup key of a crawl), host
//! extraction, and the starter-host allow-list used as the domain filter.

mod domain;
mod normalize;

pub use domain::{extract_host, is_allowed, AllowList};
pub use normalize::{normalize, normalize_url, VisitedKey};
