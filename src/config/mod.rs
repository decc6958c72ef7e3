//! Configuration module for hopcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so `Config::default()` is a complete configuration.
//!
//! # Example
//!
//! ```no_run
//! use hopcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hopcrawl.toml")).unwrap();
//! println!("Page timeout: {:?}", config.crawler.page_timeout());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, RendererConfig, RendererKind, StorageConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
