//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a body size cap
//! - Per-host rate and concurrency limiting
//! - The crawl task state machine
//! - The shared frontier and worker pool

mod fetcher;
mod frontier;
mod limiter;
mod queue;
mod scheduler;
mod site;
mod stats;
mod task;

pub use fetcher::{
    build_http_client, fetch_url, fetch_url_with_limit, parse_content_type, FetchResult,
    MAX_CONTENT, MAX_HOST_CONNECTIONS,
};
pub use frontier::Frontier;
pub use limiter::{HostLimiter, HostPermit, MAX_TRACKED_HOSTS};
pub use queue::WorkQueue;
pub use scheduler::{Crawler, WorkerContext};
pub use site::Site;
pub use stats::{CrawlStats, StatsSnapshot};
pub use task::Task;
