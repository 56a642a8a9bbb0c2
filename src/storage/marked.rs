use crate::page::Page;
use crate::storage::{PageCache, StorageResult};
use std::collections::VecDeque;
use std::sync::Arc;

const BATCH_SIZE: usize = 64;

/// Lazy walk over every cached page marked for parsing
///
/// Pages are loaded from the cache in URL order, one batch at a time, so a
/// walk over a large cache holds at most one batch in memory. Each call to
/// [`MarkedPages::new`] starts a fresh walk.
pub struct MarkedPages {
    cache: Arc<dyn PageCache>,
    sites: Vec<String>,
    cursor: Option<String>,
    buffer: VecDeque<Page>,
    exhausted: bool,
}

impl MarkedPages {
    /// Starts a walk restricted to `sites`, or over all sites when empty
    pub fn new(cache: Arc<dyn PageCache>, sites: Vec<String>) -> Self {
        Self {
            cache,
            sites,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Returns the next marked page, or `None` once the walk is done
    pub async fn next(&mut self) -> StorageResult<Option<Page>> {
        if self.buffer.is_empty() && !self.exhausted {
            let batch = self
                .cache
                .marked_batch(&self.sites, self.cursor.as_deref(), BATCH_SIZE)
                .await?;

            if batch.len() < BATCH_SIZE {
                self.exhausted = true;
            }
            if let Some(last) = batch.last() {
                self.cursor = Some(last.url.as_str().to_string());
            }
            self.buffer.extend(batch);
        }

        Ok(self.buffer.pop_front())
    }
}
