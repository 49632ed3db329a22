//! Validation Error Types

use thiserror::Error;

/// Errors during reading validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Value is NaN or infinite
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    /// Invalid device identifier
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    /// Bounds are unusable
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
