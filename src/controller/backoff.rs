//! # Exponential Backoff
//!
//! Per-key retry delays for transient failures (cache reads, secret deletes).
//! The delay doubles on each attempt from `start` up to `max`, and the number
//! of attempts is bounded: once `max_retries` is exceeded the key is dropped
//! until its next change event.
//!
//! ## Usage
//!
//! ```rust
//! use serving_cert_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(5));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(4));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Doubling backoff calculator with an upper cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    start: Duration,
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff that starts at `start` and never exceeds `max`
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        let start = start.min(max);
        Self {
            start,
            current: start,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.start;
    }
}

/// Backoff bookkeeping for one secret key
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            backoff: ExponentialBackoff::new(start, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Whether the retry budget is spent
    #[must_use]
    pub fn exhausted(&self, max_retries: u32) -> bool {
        self.error_count > max_retries
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(60));
        let seq: Vec<u128> = (0..9).map(|_| backoff.next_backoff().as_millis()).collect();
        assert_eq!(
            seq,
            vec![500, 1000, 2000, 4000, 8000, 16000, 32000, 60000, 60000]
        );
    }

    #[test]
    fn test_exponential_backoff_reset() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_start_above_max_is_capped() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_state_budget() {
        let mut state = BackoffState::new(Duration::from_secs(1), Duration::from_secs(10));
        for _ in 0..3 {
            state.increment_error();
        }
        assert!(!state.exhausted(3));
        state.increment_error();
        assert!(state.exhausted(3));

        state.reset();
        assert_eq!(state.error_count, 0);
        assert!(!state.exhausted(3));
    }

    #[test]
    fn test_per_key_states_are_independent() {
        let mut first = BackoffState::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut second = first.clone();

        assert_eq!(first.backoff.next_backoff(), Duration::from_secs(1));
        assert_eq!(first.backoff.next_backoff(), Duration::from_secs(2));
        assert_eq!(second.backoff.next_backoff(), Duration::from_secs(1));

        first.reset();
        assert_eq!(first.backoff.next_backoff(), Duration::from_secs(1));
        assert_eq!(second.backoff.next_backoff(), Duration::from_secs(2));
    }
}
