use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

struct QueueInner<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

/// Unbounded FIFO queue with completion tracking
///
/// Every [`WorkQueue::push`] counts as one unfinished item until a matching
/// [`WorkQueue::task_done`]. [`WorkQueue::join`] resolves once that count
/// reaches zero, including items pushed by the workers themselves.
pub struct WorkQueue<T> {
    inner: Mutex<QueueInner<T>>,
    available: Notify,
    drained: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item and wakes one waiting consumer
    pub fn push(&self, item: T) {
        {
            let mut inner = self.lock();
            inner.items.push_back(item);
            inner.unfinished += 1;
        }
        self.available.notify_one();
    }

    /// Removes the oldest item, waiting for one if the queue is empty
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.available.notified();
            let next = self.lock().items.pop_front();
            if let Some(item) = next {
                return item;
            }
            notified.await;
        }
    }

    /// Marks one previously popped item as fully handled
    pub fn task_done(&self) {
        let drained = {
            let mut inner = self.lock();
            inner.unfinished = inner.unfinished.saturating_sub(1);
            inner.unfinished == 0
        };
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Waits until every pushed item has been marked done
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items pushed but not yet marked done
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Items waiting to be popped
    pub fn queued(&self) -> usize {
        self.lock().items.len()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
