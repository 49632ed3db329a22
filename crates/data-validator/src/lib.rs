//! Reading Validation
//!
//! Rejects malformed sensor readings before they reach the alerting engine.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{RawReading, ReadingValidator, ValidationConfig, ValidationResult};
