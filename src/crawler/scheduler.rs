//! Crawl scheduler
//!
//! This module handles:
//! - Seeding the frontier from the selected sites
//! - Running a fixed pool of workers over the shared work queue
//! - Detecting completion and shutting the workers down

use crate::config::CrawlConfig;
use crate::crawler::fetcher::{build_http_client, MAX_HOST_CONNECTIONS};
use crate::crawler::frontier::Frontier;
use crate::crawler::limiter::HostLimiter;
use crate::crawler::site::Site;
use crate::crawler::stats::{CrawlStats, StatsSnapshot};
use crate::state::TaskState;
use crate::storage::PageCache;
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Everything a worker needs to run tasks
pub struct WorkerContext {
    pub(crate) client: Client,
    pub(crate) frontier: Arc<Frontier>,
    pub(crate) cache: Arc<dyn PageCache>,
    /// Caps connections per host across all sites
    pub(crate) connections: Arc<HostLimiter>,
    pub(crate) stats: Arc<CrawlStats>,
}

/// Crawler drives a crawl over the configured sites
///
/// The crawler coordinates:
/// - One shared frontier (work queue and seen set) for all sites
/// - Per-site host limits, owned by each [`Site`]
/// - A global per-host connection cap
pub struct Crawler {
    config: CrawlConfig,
    sites: Vec<Arc<Site>>,
    cache: Arc<dyn PageCache>,
    frontier: Arc<Frontier>,
    connections: Arc<HostLimiter>,
    stats: Arc<CrawlStats>,
}

impl Crawler {
    /// Creates a new crawler
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawl configuration
    /// * `cache` - Where fetched pages are looked up and stored
    pub fn new(config: CrawlConfig, cache: Arc<dyn PageCache>) -> Self {
        let sites = config.sites.iter().map(Site::new).collect();
        Self::with_sites(config, sites, cache)
    }

    /// Creates a crawler over prebuilt sites
    ///
    /// Use this to run sites carrying custom [`Rule`](crate::Rule)s installed
    /// with [`Site::with_crawl_rule`] or [`Site::with_parse_rule`]. The sites
    /// in `config` are ignored; only its worker count and user agent apply.
    pub fn with_sites(config: CrawlConfig, sites: Vec<Site>, cache: Arc<dyn PageCache>) -> Self {
        Self {
            config,
            sites: sites.into_iter().map(Arc::new).collect(),
            cache,
            frontier: Arc::new(Frontier::new()),
            connections: Arc::new(HostLimiter::new(MAX_HOST_CONNECTIONS, Duration::ZERO)),
            stats: Arc::new(CrawlStats::new()),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn sites(&self) -> &[Arc<Site>] {
        &self.sites
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Selects sites by name; an empty filter selects every site
    fn select_sites(&self, names: &[String]) -> Vec<Arc<Site>> {
        if names.is_empty() {
            return self.sites.clone();
        }

        for name in names {
            if !self.sites.iter().any(|s| s.name() == name) {
                warn!("Unknown site: {}", name);
            }
        }

        self.sites
            .iter()
            .filter(|s| names.iter().any(|n| n == s.name()))
            .cloned()
            .collect()
    }

    /// Queues the seeds of the selected sites
    ///
    /// Seeds are queued exactly as configured. A seed shared by two sites is
    /// crawled once, for the first of them.
    ///
    /// # Returns
    ///
    /// The number of tasks queued
    pub fn seed(&self, names: &[String]) -> usize {
        let mut queued = 0;
        for site in self.select_sites(names) {
            for seed in site.seeds() {
                if self.frontier.push_seed(&site, seed) {
                    queued += 1;
                }
            }
        }
        queued
    }

    /// Runs a crawl over the selected sites until no work is left
    ///
    /// # Arguments
    ///
    /// * `names` - Sites to crawl; empty means all
    ///
    /// # Returns
    ///
    /// * `Ok(StatsSnapshot)` - Counters for the finished crawl
    /// * `Err(CrawlError)` - The HTTP client could not be built
    pub async fn run(&self, names: &[String]) -> Result<StatsSnapshot> {
        let client = build_http_client(&self.config.user_agent)?;

        let seeded = self.seed(names);
        info!(
            "Starting crawl: {} seeds, {} workers",
            seeded, self.config.concurrency
        );
        let start_time = Instant::now();

        let ctx = Arc::new(WorkerContext {
            client,
            frontier: Arc::clone(&self.frontier),
            cache: Arc::clone(&self.cache),
            connections: Arc::clone(&self.connections),
            stats: Arc::clone(&self.stats),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.concurrency.max(1) {
            workers.spawn(run_worker(worker_id, Arc::clone(&ctx)));
        }

        self.frontier.queue().join().await;

        workers.abort_all();
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Worker panicked: {}", e);
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Crawl completed in {:?}: {} ({} URLs seen)",
            start_time.elapsed(),
            stats,
            self.frontier.seen_count()
        );
        Ok(stats)
    }
}

/// Pops tasks forever; aborted by [`Crawler::run`] once the queue drains
///
/// Each task runs in its own tokio task so a panic inside it is contained
/// and the item is still marked done.
async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>) {
    loop {
        let mut task = ctx.frontier.queue().pop().await;

        let task_ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move {
            let result = task.crawl(&task_ctx).await;
            (task, result)
        });

        match handle.await {
            Ok((_, Ok(TaskState::Dropped))) => ctx.stats.record_dropped(),
            Ok((_, Ok(_))) => {}
            Ok((task, Err(e))) => {
                error!("Error crawling {}: {}", task, e);
                ctx.stats.record_failure();
            }
            Err(e) => {
                error!("Worker {} task failed: {}", worker_id, e);
                ctx.stats.record_failure();
            }
        }

        ctx.frontier.queue().task_done();
    }
}
