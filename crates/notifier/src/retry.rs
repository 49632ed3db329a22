//! Retry Policy

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry policy for one channel.
///
/// Attempts are numbered from 1. After a transient failure of attempt `n`
/// the channel waits [`RetryPolicy::next_delay`] before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 2)
    pub max_attempts: u32,
    /// Backoff after the first failure (milliseconds, default: 1000)
    pub base_delay_ms: u64,
    /// Upper bound for any wait, server-provided or computed (milliseconds, default: 30000)
    pub max_delay_ms: u64,
    /// Extra random fraction added to computed backoff (default: 0.25)
    pub jitter: f64,
    /// Budget for a single attempt (milliseconds, default: 15000)
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: 0.25,
            attempt_timeout_ms: 15_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Deterministic exponential backoff after attempt `attempt` failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms)
            .saturating_mul(factor)
            .min(self.max_delay())
    }

    /// Delay before the next attempt given a jitter sample in `[0, 1]`.
    ///
    /// A server-provided delay wins over computed backoff and is not jittered.
    pub fn delay_with(&self, attempt: u32, retry_after: Option<Duration>, jitter_sample: f64) -> Duration {
        if let Some(server) = retry_after {
            return server.min(self.max_delay());
        }
        let spread = self.jitter.max(0.0) * jitter_sample.clamp(0.0, 1.0);
        self.backoff(attempt)
            .mul_f64(1.0 + spread)
            .min(self.max_delay())
    }

    /// Delay before the next attempt, with random jitter
    pub fn next_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.delay_with(attempt, retry_after, sample)
    }
}
