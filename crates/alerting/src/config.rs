//! Thresholds and Runtime Configuration

use crate::error::AlertingError;
use crate::event::Bounds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Timing policy for the state machine, fixed for the lifetime of a manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Expected reporting interval of a device (seconds, default: 300)
    pub heartbeat_interval_secs: u64,
    /// Cooldown between repeated notifications of one kind (seconds, default: 1800)
    pub cooldown_secs: u64,
    /// Temperature jump that bypasses the alert cooldown (default: 1.5)
    pub spike_threshold: f64,
    /// Missed intervals before a device is declared offline (default: 2)
    pub offline_multiplier: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 300,
            cooldown_secs: 1800, // 30 minutes
            spike_threshold: 1.5,
            offline_multiplier: 2,
        }
    }
}

impl Thresholds {
    /// Cooldown window in milliseconds
    pub fn cooldown_ms(&self) -> i64 {
        secs_to_ms(self.cooldown_secs)
    }

    /// Staleness after which a device is considered offline, in milliseconds
    pub fn offline_after_ms(&self) -> i64 {
        secs_to_ms(self.heartbeat_interval_secs).saturating_mul(i64::from(self.offline_multiplier))
    }

    /// Reject values that would make the engine misbehave
    pub fn validate(&self) -> Result<(), AlertingError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(AlertingError::InvalidThreshold {
                field: "heartbeat_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.offline_multiplier == 0 {
            return Err(AlertingError::InvalidThreshold {
                field: "offline_multiplier",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.spike_threshold.is_finite() || self.spike_threshold <= 0.0 {
            return Err(AlertingError::InvalidThreshold {
                field: "spike_threshold",
                reason: format!("must be a positive number, got {}", self.spike_threshold),
            });
        }
        Ok(())
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

/// Per-channel delivery settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Administrative switch
    pub enabled: bool,
    /// Recipient addresses or webhook URL
    pub destinations: Vec<String>,
    /// Minimum gap between two posts (0 disables rate limiting)
    pub min_interval_ms: u64,
    /// Thread to post into, for channels that support it
    pub thread_id: Option<String>,
}

impl ChannelConfig {
    /// Whether the channel is both enabled and has somewhere to deliver to
    pub fn is_deliverable(&self) -> bool {
        self.enabled && self.destinations.iter().any(|d| !d.trim().is_empty())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Configuration the engine pulls at the moment it needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Global notification switch
    pub alerts_enabled: bool,
    /// Bounds used when a reading carries none
    pub default_bounds: Bounds,
    /// Channel settings keyed by channel name
    pub channels: BTreeMap<String, ChannelConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            alerts_enabled: true,
            default_bounds: Bounds::default(),
            channels: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.get(name)
    }
}

/// Source of the current runtime configuration.
///
/// Implementations must return a fresh view on every call; callers never
/// cache the result across events.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> RuntimeConfig;
}

/// Fixed configuration
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub RuntimeConfig);

impl ConfigProvider for StaticConfig {
    fn current(&self) -> RuntimeConfig {
        self.0.clone()
    }
}

/// Configuration that can be replaced while the engine runs
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<RuntimeConfig>>,
}

impl SharedConfig {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Mutate the configuration in place; the next event observes the change
    pub fn update(&self, f: impl FnOnce(&mut RuntimeConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl ConfigProvider for SharedConfig {
    fn current(&self) -> RuntimeConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.cooldown_ms(), 1_800_000);
        assert_eq!(thresholds.offline_after_ms(), 600_000);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_huge_thresholds_saturate() {
        let thresholds = Thresholds {
            heartbeat_interval_secs: u64::MAX,
            cooldown_secs: u64::MAX,
            offline_multiplier: u32::MAX,
            ..Default::default()
        };
        assert_eq!(thresholds.offline_after_ms(), i64::MAX);
        assert_eq!(thresholds.cooldown_ms(), i64::MAX);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_invalid_thresholds() {
        let zero_interval = Thresholds {
            heartbeat_interval_secs: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let negative_spike = Thresholds {
            spike_threshold: -1.0,
            ..Default::default()
        };
        let err = negative_spike.validate().unwrap_err();
        assert!(err.to_string().contains("spike_threshold"));
    }

    #[test]
    fn test_channel_deliverable() {
        let mut channel = ChannelConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(!channel.is_deliverable());

        channel.destinations.push("  ".to_string());
        assert!(!channel.is_deliverable());

        channel.destinations.push("ops@example.com".to_string());
        assert!(channel.is_deliverable());

        channel.enabled = false;
        assert!(!channel.is_deliverable());
    }

    #[test]
    fn test_shared_config_update_is_visible() {
        let shared = SharedConfig::new(RuntimeConfig::default());
        let reader: Arc<dyn ConfigProvider> = Arc::new(shared.clone());
        assert!(reader.current().alerts_enabled);

        shared.update(|cfg| cfg.alerts_enabled = false);
        assert!(!reader.current().alerts_enabled);
    }
}
