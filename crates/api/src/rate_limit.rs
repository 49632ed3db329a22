//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Limits reading ingestion per peer IP address using tower_governor.
//! The Generic Cell Rate Algorithm (GCRA) needs no background process to
//! refill its buckets.

use crate::error::ApiError;
use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config keyed by peer IP, with X-RateLimit-* headers enabled
pub type PeerGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Seconds between two replenished cells
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Devices report every few minutes; one cell per second with a burst
        // of 20 absorbs a gateway flushing its backlog.
        Self {
            per_second: 1,
            burst_size: 20,
        }
    }
}

impl RateLimitConfig {
    /// Tight limits for operator endpoints that fan out notifications
    pub fn strict() -> Self {
        Self {
            per_second: 4,
            burst_size: 2,
        }
    }
}

/// Build a per-peer-IP governor config.
///
/// Requires the service to run with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the peer IP is
/// available.
pub fn create_governor_config(config: &RateLimitConfig) -> Result<Arc<PeerGovernorConfig>, ApiError> {
    let governor = GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .ok_or_else(|| {
            ApiError::Config(format!(
                "invalid rate limit: per_second={} burst_size={}",
                config.per_second, config.burst_size
            ))
        })?;
    Ok(Arc::new(governor))
}
