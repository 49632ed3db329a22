//! Per-Channel Minimum Gap
//!
//! Posts that arrive before the gap has elapsed wait for it instead of being
//! dropped. Waiters queue on the lock, so they leave one gap apart.
//!
//! The gap is read from the channel config on every post, so it can change
//! between two posts; only the last post instant is kept. Waiting runs on the
//! tokio clock.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between consecutive posts on one channel
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_post: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `min_gap` has passed since the previous post, then record
    /// this post. Returns how long the caller waited.
    pub async fn acquire(&self, min_gap: Duration) -> Duration {
        let mut last = self.last_post.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last {
            let ready_at = previous + min_gap;
            let now = Instant::now();
            if ready_at > now {
                waited = ready_at - now;
                debug!(wait_ms = waited.as_millis() as u64, "Rate limit, delaying post");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_post_is_immediate() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.acquire(Duration::from_secs(5)).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_post_waits_for_gap() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.acquire(Duration::from_secs(2)).await;
        let waited = limiter.acquire(Duration::from_secs(2)).await;

        assert_eq!(waited, Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_already_elapsed() {
        let limiter = RateLimiter::new();
        limiter.acquire(Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(limiter.acquire(Duration::from_secs(1)).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_gap_applies_to_next_post() {
        let limiter = RateLimiter::new();
        limiter.acquire(Duration::from_secs(5)).await;

        assert_eq!(limiter.acquire(Duration::from_secs(1)).await, Duration::from_secs(1));
        assert_eq!(limiter.acquire(Duration::from_secs(3)).await, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_gap_disables_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert_eq!(limiter.acquire(Duration::ZERO).await, Duration::ZERO);
        }
    }
}
