//! API Error Types

use alerting::AlertingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use data_validator::ValidationError;
use notifier::NotifyError;
use serde_json::json;

/// Errors surfaced by HTTP handlers and service wiring
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The submitted reading failed plausibility checks
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown device
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Engine thresholds were rejected
    #[error(transparent)]
    Alerting(#[from] AlertingError),

    /// A notification transport could not be built
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::DeviceNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Alerting(_) | ApiError::Notify(_) | ApiError::Config(_) => {
                tracing::error!(error = %self, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_422() {
        let err = ApiError::from(ValidationError::MissingField("temperature"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ApiError::DeviceNotFound("freezer-9".to_string());
        assert_eq!(err.to_string(), "Device not found: freezer-9");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
