//! Alerting Error Types

use thiserror::Error;

/// Errors raised while configuring the alerting engine
#[derive(Debug, Clone, Error)]
pub enum AlertingError {
    /// A threshold has a value the engine cannot work with
    #[error("Invalid threshold {field}: {reason}")]
    InvalidThreshold {
        field: &'static str,
        reason: String,
    },
}
