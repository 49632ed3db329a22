//! Heartbeat Sweeper
//!
//! Periodically asks the alert manager which devices have gone silent.

use alerting::AlertManager;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Run `check_heartbeats` every `every` against the wall clock, starting one
/// period from now.
///
/// Abort the returned handle to stop the sweep.
pub fn spawn_heartbeat_sweeper(manager: Arc<AlertManager>, every: Duration) -> JoinHandle<()> {
    spawn_heartbeat_sweeper_with_clock(manager, every, || Utc::now().timestamp_millis())
}

/// Same as [`spawn_heartbeat_sweeper`] with an explicit clock in epoch
/// milliseconds. It must be the clock readings are stamped with.
pub fn spawn_heartbeat_sweeper_with_clock<C>(manager: Arc<AlertManager>, every: Duration, now_ms: C) -> JoinHandle<()>
where
    C: Fn() -> i64 + Send + 'static,
{
    info!(interval_secs = every.as_secs(), "Starting heartbeat sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let events = manager.check_heartbeats(now_ms()).await;
            metrics::gauge!("sensor_watch_devices").set(manager.device_count() as f64);
            debug!(offline = events.len(), "Heartbeat sweep complete");
        }
    })
}
