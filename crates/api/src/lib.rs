//! Sensor Watch API Server
//!
//! HTTP ingest for device readings, device status, operator test
//! notifications, and Prometheus metrics. A background sweeper marks
//! silent devices offline.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use alerting::{AlertManager, ConfigProvider, SharedConfig};
use data_validator::ReadingValidator;
use notifier::{
    Channel, EmailTransport, NotificationDispatcher, RenderStyle, WebhookTransport, EMAIL_CHANNEL,
    WEBHOOK_CHANNEL,
};

mod error;
mod rate_limit;
mod routes;
mod settings;
mod sweeper;

pub use error::ApiError;
pub use rate_limit::{create_governor_config, PeerGovernorConfig, RateLimitConfig};
pub use settings::{LogSettings, ServerSettings, Settings, CONFIG_PATH_VAR};
pub use sweeper::{spawn_heartbeat_sweeper, spawn_heartbeat_sweeper_with_clock};

/// Application state shared across handlers
pub struct AppState {
    /// Device state machines
    pub manager: Arc<AlertManager>,
    /// Channel fan-out, also the manager's event sink
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Runtime configuration shared with the engine
    pub config: SharedConfig,
    /// Plausibility checks for ingested readings
    pub validator: ReadingValidator,
    /// Prometheus exposition
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the manager to `dispatcher` and capture the remaining settings
    pub fn new(
        settings: &Settings,
        config: SharedConfig,
        dispatcher: NotificationDispatcher,
        metrics: PrometheusHandle,
    ) -> Result<Self, ApiError> {
        let dispatcher = Arc::new(dispatcher);
        let provider: Arc<dyn ConfigProvider> = Arc::new(config.clone());
        let manager = AlertManager::new(settings.thresholds.clone(), provider, dispatcher.clone())?;

        Ok(Self {
            manager: Arc::new(manager),
            dispatcher,
            config,
            validator: ReadingValidator::new(settings.validation.clone()),
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }
}

/// Register the webhook channel, plus email when SMTP is configured
pub fn build_dispatcher(settings: &Settings, config: SharedConfig) -> Result<NotificationDispatcher, ApiError> {
    let mut dispatcher = NotificationDispatcher::new(Arc::new(config));

    dispatcher.register_channel(
        Channel::new(WEBHOOK_CHANNEL, RenderStyle::Structured, Arc::new(WebhookTransport::new()?))
            .with_retry(settings.retry.clone()),
    );

    match &settings.smtp {
        Some(smtp) => dispatcher.register_channel(
            Channel::new(EMAIL_CHANNEL, RenderStyle::Mail, Arc::new(EmailTransport::new(smtp)?))
                .with_retry(settings.retry.clone()),
        ),
        None => info!("No SMTP settings, email channel disabled"),
    }

    Ok(dispatcher)
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub device_count: usize,
    pub alerts_enabled: bool,
    pub channels: Vec<String>,
}

/// Per-IP limits applied to the mutating routes
pub struct RouteLimits {
    pub ingest: Arc<PeerGovernorConfig>,
    pub operator: Arc<PeerGovernorConfig>,
}

impl RouteLimits {
    pub fn from_settings(server: &ServerSettings) -> Result<Self, ApiError> {
        Ok(Self {
            ingest: create_governor_config(&server.ingest_rate_limit)?,
            operator: create_governor_config(&server.operator_rate_limit)?,
        })
    }
}

/// Create the application router
pub fn create_router(state: SharedState, limits: Option<RouteLimits>) -> Router {
    let mut ingest = Router::new().route("/api/v1/readings", post(routes::readings::ingest_reading));
    let mut operator = Router::new().route(
        "/api/v1/notifications/test",
        post(routes::notifications::send_test),
    );
    if let Some(limits) = limits {
        ingest = ingest.route_layer(GovernorLayer {
            config: limits.ingest,
        });
        operator = operator.route_layer(GovernorLayer {
            config: limits.operator,
        });
    }

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/devices", get(routes::devices::list_devices))
        .route(
            "/api/v1/devices/:id",
            get(routes::devices::get_device).delete(routes::devices::delete_device),
        )
        .route("/metrics", get(metrics_handler))
        .merge(ingest)
        .merge(operator)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        device_count: state.manager.device_count(),
        alerts_enabled: state.config.current().alerts_enabled,
        channels: state
            .dispatcher
            .channel_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    };

    Json(response)
}

/// Prometheus exposition handler
async fn metrics_handler(State(state): State<SharedState>) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics.render())
}

/// Initialize logging
pub fn init_logging(settings: &LogSettings) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = settings.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let config = SharedConfig::new(settings.notifications.clone());
    let dispatcher = build_dispatcher(&settings, config.clone())?;
    let state = Arc::new(AppState::new(&settings, config, dispatcher, prometheus)?);

    let sweeper = spawn_heartbeat_sweeper(
        state.manager.clone(),
        Duration::from_secs(settings.server.sweep_interval_secs.max(1)),
    );

    let limits = RouteLimits::from_settings(&settings.server)?;
    let app = create_router(state, Some(limits));

    info!("Starting API server on {}", settings.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
