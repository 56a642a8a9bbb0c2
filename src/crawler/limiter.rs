//! Per-host rate and concurrency limiter
//!
//! Each host gets its own semaphore bounding requests in flight and a
//! [`HostState`] spacing request starts by a fixed delay. Hosts are tracked
//! lazily on first use. Once more than [`MAX_TRACKED_HOSTS`] are tracked, idle
//! hosts are forgotten: nothing holds or awaits a permit and their delay has
//! already elapsed, so a fresh slot behaves the same.

use crate::state::HostState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Hosts tracked before idle ones are evicted
pub const MAX_TRACKED_HOSTS: usize = 1000;

#[derive(Debug)]
struct HostSlot {
    semaphore: Arc<Semaphore>,
    state: Mutex<HostState>,
}

impl HostSlot {
    fn is_idle(slot: &Arc<Self>, concurrency: usize, delay: Duration, now: Instant) -> bool {
        Arc::strong_count(slot) == 1
            && slot.semaphore.available_permits() == concurrency
            && slot
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .time_until_next_request(delay, now)
                .is_none()
    }
}

/// Limits concurrent requests and request frequency per host
#[derive(Debug)]
pub struct HostLimiter {
    concurrency: usize,
    delay: Duration,
    max_hosts: usize,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

/// Permission to make one request to a host
///
/// Released when dropped.
#[derive(Debug)]
pub struct HostPermit {
    _permit: OwnedSemaphorePermit,
}

impl HostLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum requests in flight per host (at least 1)
    /// * `delay` - Minimum time between the starts of consecutive requests
    ///   to the same host
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self::with_max_hosts(concurrency, delay, MAX_TRACKED_HOSTS)
    }

    fn with_max_hosts(concurrency: usize, delay: Duration, max_hosts: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay,
            max_hosts,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of hosts currently tracked
    pub fn host_count(&self) -> usize {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for a free slot on `host` and for its next start time
    ///
    /// # Returns
    ///
    /// * `Ok(HostPermit)` - The request may start now
    /// * `Err(AcquireError)` - The host's semaphore was closed
    pub async fn acquire(&self, host: &str) -> Result<HostPermit, AcquireError> {
        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            if hosts.len() >= self.max_hosts && !hosts.contains_key(host) {
                let now = Instant::now();
                hosts.retain(|_, slot| !HostSlot::is_idle(slot, self.concurrency, self.delay, now));
            }
            Arc::clone(hosts.entry(host.to_string()).or_insert_with(|| {
                Arc::new(HostSlot {
                    semaphore: Arc::new(Semaphore::new(self.concurrency)),
                    state: Mutex::new(HostState::new()),
                })
            }))
        };

        let permit = Arc::clone(&slot.semaphore).acquire_owned().await?;

        let wait = slot
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reserve(self.delay, Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        Ok(HostPermit { _permit: permit })
    }
}
