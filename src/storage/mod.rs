//! Page cache
//!
//! This module defines the contract the crawler uses to look up, store and
//! re-flag fetched pages, and a SQLite implementation of it:
//! - [`PageCache`]: the async cache contract
//! - [`SqliteCache`]: the SQLite-backed cache used by the binary
//! - [`MarkedPages`]: a lazy, restartable walk over pages marked for parsing

mod marked;
mod schema;
mod sqlite;

pub use marked::MarkedPages;
pub use schema::initialize_schema;
pub use sqlite::{SqliteCache, MAX_STORAGE_CONNECTIONS};

use crate::page::Page;
use crate::url::CrawlUrl;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage connection limiter closed")]
    Closed(#[from] tokio::sync::AcquireError),

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Storage connection poisoned by a panicked writer")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store of fetched pages
///
/// Keys are literal URL strings. Callers clean URLs before lookup; the cache
/// does not canonicalize, so two spellings of the same resource can occupy
/// two rows.
#[async_trait]
pub trait PageCache: Send + Sync {
    /// Finds a page whose fetched or originally requested URL equals `url`
    ///
    /// Returned pages have `retrieved` set.
    async fn find(&self, url: &CrawlUrl) -> StorageResult<Option<Page>>;

    /// Inserts the page, or overwrites the mutable fields of the row with the
    /// same fetched URL
    async fn save(&self, page: &Page) -> StorageResult<()>;

    /// Updates only the `parse` flag of the row with the page's fetched URL
    async fn update_parse_flag(&self, page: &Page) -> StorageResult<()>;

    /// Returns up to `limit` pages marked for parsing whose URL sorts after
    /// `after`, ordered by URL, optionally restricted to the named sites
    async fn marked_batch(
        &self,
        sites: &[String],
        after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Page>>;
}
