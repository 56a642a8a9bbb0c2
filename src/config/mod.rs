//! Configuration module for mediacrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use mediacrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mediacrawl.toml")).unwrap();
//! println!("Crawler will run {} workers", config.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CrawlConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
