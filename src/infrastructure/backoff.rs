//! Exponential backoff with jitter for stream reconnection.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectionConfig;

/// Exponential backoff state for one connection worker.
///
/// Delays grow by `backoff_multiplier` per failed attempt, capped at
/// `max_delay_ms`, with random jitter added so workers reconnecting at the
/// same moment do not stampede the endpoint. The attempt counter only goes
/// back to zero via [`Backoff::reset`], which the worker calls after the
/// link has proven stable.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectionConfig,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: ReconnectionConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Consecutive failed attempts so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// True once the attempt budget is spent.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Record a failure and return the delay to sleep before the next
    /// attempt.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.max_delay_ms as f64);
        let jitter = capped * self.config.jitter_ratio * rand::thread_rng().gen::<f64>();
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis((capped + jitter) as u64)
    }

    /// Clear the attempt counter after a stable session.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
