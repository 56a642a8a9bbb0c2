use std::time::{Duration, Instant};

/// Tracks request timing for one host within one site
///
/// The crawler holds this behind a lock and calls [`HostState::reserve`]
/// without awaiting in between, so concurrent callers are handed distinct,
/// evenly spaced start slots.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Start time of the most recently reserved request
    pub last_request_start: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with no recorded requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request may start
    ///
    /// # Arguments
    ///
    /// * `delay` - Minimum spacing between request starts
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `None` - A request may start now
    /// * `Some(duration)` - How long to wait first
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_start?;
        let next = last + delay;
        if next > now {
            Some(next - now)
        } else {
            None
        }
    }

    /// Reserves the next start slot and returns how long to wait for it
    ///
    /// The slot is recorded immediately, so the following caller is spaced
    /// `delay` after this one even before this one has started.
    pub fn reserve(&mut self, delay: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(delay, now).unwrap_or(Duration::ZERO);
        self.last_request_start = Some(now + wait);
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_immediate() {
        let mut state = HostState::new();
        let now = Instant::now();
        assert!(state.time_until_next_request(Duration::from_secs(1), now).is_none());
        assert_eq!(state.reserve(Duration::from_secs(1), now), Duration::ZERO);
        assert_eq!(state.last_request_start, Some(now));
    }

    #[test]
    fn test_reservations_are_spaced() {
        let mut state = HostState::new();
        let delay = Duration::from_millis(500);
        let now = Instant::now();

        assert_eq!(state.reserve(delay, now), Duration::ZERO);
        assert_eq!(state.reserve(delay, now), delay);
        assert_eq!(state.reserve(delay, now), delay * 2);
    }

    #[test]
    fn test_wait_shrinks_as_time_passes() {
        let mut state = HostState::new();
        let delay = Duration::from_secs(2);
        let start = Instant::now();
        state.reserve(delay, start);

        let later = start + Duration::from_millis(1500);
        assert_eq!(
            state.time_until_next_request(delay, later),
            Some(Duration::from_millis(500))
        );

        let much_later = start + Duration::from_secs(3);
        assert!(state.time_until_next_request(delay, much_later).is_none());
        assert_eq!(state.reserve(delay, much_later), Duration::ZERO);
    }

    #[test]
    fn test_zero_delay_never_waits() {
        let mut state = HostState::new();
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(state.reserve(Duration::ZERO, now), Duration::ZERO);
        }
    }
}
