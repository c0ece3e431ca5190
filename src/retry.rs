//! Bounded retry with exponential backoff.

use std::time::Duration;

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub base_backoff: Duration,
    /// Upper bound on a single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default 30 second delay cap.
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            max_backoff: Duration::from_secs(30),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of attempts including the first one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }

    /// Worst-case time for every attempt to run `per_attempt` plus the
    /// delays between them.
    pub fn budget(&self, per_attempt: Duration) -> Duration {
        (0..self.max_retries).fold(
            per_attempt.saturating_mul(self.attempts()),
            |total, attempt| total.saturating_add(self.delay_for(attempt)),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}
