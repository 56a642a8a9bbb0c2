use crate::crawler::queue::WorkQueue;
use crate::crawler::site::Site;
use crate::crawler::task::Task;
use crate::url::CrawlUrl;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Work queue plus the set of canonical ids ever queued
///
/// The seen set only grows. A URL is queued at most once per crawl, no matter
/// how many sites or pages link to it.
pub struct Frontier {
    queue: WorkQueue<Task>,
    seen: Mutex<HashSet<String>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            queue: WorkQueue::new(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn queue(&self) -> &WorkQueue<Task> {
        &self.queue
    }

    /// Records a canonical id; returns false if it was already present
    fn mark_seen(&self, id: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }

    /// Queues a seed as given, skipping ids already seen
    pub fn push_seed(&self, site: &Arc<Site>, url: &CrawlUrl) -> bool {
        if !self.mark_seen(url.id()) {
            return false;
        }
        self.queue.push(Task::new(Arc::clone(site), url.clone()));
        true
    }

    /// Queues a discovered URL for `site`
    ///
    /// The URL is rejected when it is not http(s) or the site's crawl rule
    /// denies it, then cleaned and dropped if its id was seen before.
    ///
    /// # Returns
    ///
    /// * `true` - A new task was queued
    /// * `false` - The URL was rejected or is a duplicate
    pub fn enqueue(&self, site: &Arc<Site>, url: &CrawlUrl) -> bool {
        if !url.is_http() {
            return false;
        }

        let cleaned = site.clean(url);
        if site.check_crawl(&cleaned, None).is_denied() {
            debug!("Not following {}: denied by crawl rule", cleaned);
            return false;
        }

        if !self.mark_seen(cleaned.id()) {
            return false;
        }
        self.queue.push(Task::new(Arc::clone(site), cleaned));
        true
    }

    /// Whether a URL with the same canonical id was ever queued
    pub fn is_seen(&self, url: &CrawlUrl) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url.id())
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Tasks waiting for a worker
    pub fn pending(&self) -> usize {
        self.queue.queued()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
