//! URL handling module
//!
//! This module provides the crawler's URL value type: parsing, canonical
//! fingerprints used for deduplication, per-site cleaning of query parameters,
//! and resolution of relative links.

mod canonical;

pub use canonical::CrawlUrl;
