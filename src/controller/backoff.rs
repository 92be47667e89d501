//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciles: min, min, 2*min, 3*min,
//! 5*min, ... capped at max. Each reconcile loop owns one instance and resets
//! it after a successful reconcile.

use std::time::Duration;

/// Fibonacci backoff calculator, in seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_secs`, never exceeding `max_secs`
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            max_secs,
            previous: 0,
            current: min_secs,
        }
    }

    /// Delay for the next retry, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.min(self.max_secs);
        let next = self.previous.saturating_add(self.current);
        self.previous = self.current;
        self.current = next.min(self.max_secs);
        delay
    }

    /// Delay for the next retry as a [`Duration`]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Start over from the minimum delay
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.min_secs;
    }
}
