//! Reading Validator

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Physically plausible temperature range (°C)
    pub temperature_range: (f64, f64),
    /// Maximum device id length
    pub max_device_id_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            temperature_range: (-200.0, 200.0),
            max_device_id_len: 64,
        }
    }
}

/// A reading as it arrives from a device, before any checks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub device_id: String,
    pub temperature: Option<f64>,
    #[serde(default)]
    pub fault_code: u32,
    /// Device-side timestamp; informational, the receiver stamps its own
    pub timestamp_ms: Option<i64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

/// Result of validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether all values are valid
    pub valid: bool,
    /// List of validation errors
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validator for incoming readings
pub struct ReadingValidator {
    config: ValidationConfig,
}

impl ReadingValidator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a reading, stopping at the first problem
    pub fn validate(&self, reading: &RawReading) -> Result<(), ValidationError> {
        match self.check(reading).errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run every check and collect all problems
    pub fn check(&self, reading: &RawReading) -> ValidationResult {
        let mut errors = Vec::new();

        if let Err(e) = self.validate_device_id(&reading.device_id) {
            errors.push(e);
        }
        match reading.temperature {
            Some(t) => {
                if let Err(e) = self.validate_temperature(t) {
                    errors.push(e);
                }
            }
            None => errors.push(ValidationError::MissingField("temperature")),
        }
        if let Err(e) = self.validate_bounds(reading.lower_bound, reading.upper_bound) {
            errors.push(e);
        }

        if !errors.is_empty() {
            debug!(device = %reading.device_id, errors = errors.len(), "Reading rejected");
        }
        ValidationResult::from_errors(errors)
    }

    /// Validate a device identifier
    pub fn validate_device_id(&self, id: &str) -> Result<(), ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::MissingField("device_id"));
        }
        if id.len() > self.config.max_device_id_len {
            return Err(ValidationError::InvalidDeviceId(format!(
                "longer than {} characters",
                self.config.max_device_id_len
            )));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
        {
            return Err(ValidationError::InvalidDeviceId(format!("unexpected character {c:?}")));
        }
        Ok(())
    }

    /// Validate a temperature value
    pub fn validate_temperature(&self, temp: f64) -> Result<(), ValidationError> {
        if !temp.is_finite() {
            return Err(ValidationError::NotFinite("temperature"));
        }
        let (min, max) = self.config.temperature_range;
        if temp < min || temp > max {
            return Err(ValidationError::OutOfRange {
                field: "temperature",
                value: temp,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Bounds must be given as a finite, ordered pair or not at all
    pub fn validate_bounds(&self, lower: Option<f64>, upper: Option<f64>) -> Result<(), ValidationError> {
        match (lower, upper) {
            (None, None) => Ok(()),
            (Some(lower), Some(upper)) => {
                if !lower.is_finite() || !upper.is_finite() {
                    return Err(ValidationError::NotFinite("bounds"));
                }
                if lower >= upper {
                    return Err(ValidationError::InvalidBounds(format!(
                        "lower {lower} must be below upper {upper}"
                    )));
                }
                Ok(())
            }
            _ => Err(ValidationError::InvalidBounds(
                "lower and upper must be given together".to_string(),
            )),
        }
    }
}

impl Default for ReadingValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
