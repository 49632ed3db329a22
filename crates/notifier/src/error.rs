//! Notification Error Types

use thiserror::Error;

/// Errors raised while building transports or composing messages.
///
/// Delivery failures are not errors; they are reported as outcomes.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// SMTP transport-level failure
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// A sender or recipient address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled
    #[error("Email build error: {0}")]
    Build(String),
}
