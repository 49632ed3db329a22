//! Sensor Watch - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_logging(&settings.logging).context("failed to install tracing subscriber")?;

    info!("=== Sensor Watch v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        heartbeat_interval_secs = settings.thresholds.heartbeat_interval_secs,
        cooldown_secs = settings.thresholds.cooldown_secs,
        alerts_enabled = settings.notifications.alerts_enabled,
        "Starting temperature alerting service..."
    );

    run_server(settings).await
}
