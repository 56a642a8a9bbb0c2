use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected while a crawl runs
#[derive(Debug, Default)]
pub struct CrawlStats {
    fetched: AtomicU64,
    cache_hits: AtomicU64,
    persisted: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Pages fetched from the network
    pub fetched: u64,
    /// Pages served from the cache
    pub cache_hits: u64,
    /// Fresh pages written to the cache
    pub persisted: u64,
    /// Tasks that ended without persisting a page
    pub dropped: u64,
    /// Tasks that ended with an error
    pub failed: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} from cache, {} persisted, {} dropped, {} failed",
            self.fetched, self.cache_hits, self.persisted, self.dropped, self.failed
        )
    }
}
