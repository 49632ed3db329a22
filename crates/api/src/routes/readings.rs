//! Reading Ingest Route

use axum::{extract::State, Json};
use chrono::Utc;
use data_validator::{RawReading, ValidationError};
use serde::Serialize;
use tracing::{debug, warn};

use alerting::{DeviceStatus, EventKind, Reading};

use crate::error::ApiError;
use crate::SharedState;

/// Response for a processed reading
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub device_id: String,
    /// Receipt time; all timing decisions use this clock
    pub received_at_ms: i64,
    /// Timestamp reported by the device, informational only
    pub reported_at_ms: Option<i64>,
    /// Device status after the reading
    pub status: DeviceStatus,
    /// Events the reading produced, in emission order
    pub events: Vec<EventKind>,
}

/// Validate a reading and feed it to the device's state machine
pub async fn ingest_reading(
    State(state): State<SharedState>,
    Json(raw): Json<RawReading>,
) -> Result<Json<IngestResponse>, ApiError> {
    if let Err(e) = state.validator.validate(&raw) {
        warn!(device = %raw.device_id, error = %e, "Rejected reading");
        metrics::counter!("sensor_watch_readings_rejected_total").increment(1);
        return Err(e.into());
    }

    let reported_at_ms = raw.timestamp_ms;
    let reading = into_reading(raw, Utc::now().timestamp_millis())?;
    let device_id = reading.device_id.clone();
    let received_at_ms = reading.timestamp_ms;
    metrics::counter!("sensor_watch_readings_total").increment(1);

    let events = state.manager.update_reading(reading).await;
    debug!(
        device = %device_id,
        events = events.len(),
        skew_ms = reported_at_ms.map(|t| t - received_at_ms),
        "Reading ingested"
    );

    let status = state
        .manager
        .get_state(&device_id)
        .map(|s| s.status)
        .unwrap_or(DeviceStatus::Normal);

    Ok(Json(IngestResponse {
        device_id,
        received_at_ms,
        reported_at_ms,
        status,
        events: events.iter().map(|e| e.kind).collect(),
    }))
}

/// Convert a validated raw reading, stamped with the server's receipt time.
///
/// The device clock is never trusted for cooldowns or offline detection.
pub fn into_reading(raw: RawReading, received_at_ms: i64) -> Result<Reading, ValidationError> {
    let temperature = raw.temperature.ok_or(ValidationError::MissingField("temperature"))?;

    Ok(Reading {
        device_id: raw.device_id,
        temperature,
        fault_code: raw.fault_code,
        timestamp_ms: received_at_ms,
        lower_bound: raw.lower_bound,
        upper_bound: raw.upper_bound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_time_is_stamped() {
        let raw = RawReading {
            device_id: "freezer-1".to_string(),
            temperature: Some(-80.0),
            ..Default::default()
        };
        let reading = into_reading(raw, 1_700_000_000_000).unwrap();
        assert_eq!(reading.timestamp_ms, 1_700_000_000_000);
        assert_eq!(reading.lower_bound, None);
    }

    #[test]
    fn test_device_timestamp_is_ignored() {
        let raw = RawReading {
            device_id: "freezer-1".to_string(),
            temperature: Some(-80.0),
            fault_code: 3,
            timestamp_ms: Some(42),
            lower_bound: Some(-85.0),
            upper_bound: Some(-75.0),
        };
        let reading = into_reading(raw, 1_700_000_000_000).unwrap();
        assert_eq!(reading.timestamp_ms, 1_700_000_000_000);
        assert_eq!(reading.fault_code, 3);
        assert_eq!(reading.upper_bound, Some(-75.0));
    }

    #[test]
    fn test_missing_temperature() {
        let raw = RawReading {
            device_id: "freezer-1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            into_reading(raw, 0).unwrap_err(),
            ValidationError::MissingField("temperature")
        );
    }
}
