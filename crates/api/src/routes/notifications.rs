//! Notification Test Route

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use alerting::{AlertEvent, ConfigProvider};
use notifier::DispatchReport;

use crate::SharedState;

/// Query parameters for a test notification
#[derive(Debug, Deserialize)]
pub struct TestQuery {
    /// Name shown as the event's device
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "sensor-watch".to_string()
}

/// Send a `heartbeat` event through every channel and report the outcome
pub async fn send_test(
    State(state): State<SharedState>,
    Query(params): Query<TestQuery>,
) -> Json<DispatchReport> {
    let bounds = state.config.current().default_bounds;
    let event = AlertEvent::heartbeat(params.source, bounds, Utc::now().timestamp_millis());

    info!(source = %event.device_id, "Dispatching test notification");
    Json(state.dispatcher.dispatch(&event).await)
}
