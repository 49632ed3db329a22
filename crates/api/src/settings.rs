//! Service Settings
//!
//! Loaded from an optional TOML file (`sensor-watch.toml`, or the path in
//! `SENSOR_WATCH_CONFIG`) overlaid by `SENSOR_WATCH__*` environment
//! variables, e.g. `SENSOR_WATCH__SERVER__BIND_ADDR=127.0.0.1:9000`.

use crate::rate_limit::RateLimitConfig;
use alerting::{RuntimeConfig, Thresholds};
use config::{Config, ConfigError, Environment, File, FileFormat};
use data_validator::ValidationConfig;
use notifier::{RetryPolicy, SmtpSettings};
use serde::Deserialize;

/// Environment variable naming the settings file
pub const CONFIG_PATH_VAR: &str = "SENSOR_WATCH_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "sensor-watch";
const ENV_PREFIX: &str = "SENSOR_WATCH";

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Period of the offline sweep (seconds, default: 60)
    pub sweep_interval_secs: u64,
    /// Per-IP limit on `POST /api/v1/readings`
    pub ingest_rate_limit: RateLimitConfig,
    /// Per-IP limit on `POST /api/v1/notifications/test`
    pub operator_rate_limit: RateLimitConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            sweep_interval_secs: 60,
            ingest_rate_limit: RateLimitConfig::default(),
            operator_rate_limit: RateLimitConfig::strict(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Max level: trace, debug, info, warn, error
    pub level: String,
    /// Emit one JSON object per line
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the service needs to start
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LogSettings,
    pub thresholds: Thresholds,
    /// Alert switch, default bounds, and per-channel delivery settings
    pub notifications: RuntimeConfig,
    pub retry: RetryPolicy,
    /// Email channel is registered only when present
    pub smtp: Option<SmtpSettings>,
    pub validation: ValidationConfig,
}

impl Settings {
    /// Load from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse settings from TOML text, without consulting the environment
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
