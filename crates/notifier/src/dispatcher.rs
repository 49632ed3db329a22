//! Notification Dispatcher - fans one event out to every registered channel

use crate::channel::{Channel, ChannelReport};
use alerting::{AlertEvent, ConfigProvider, EventKind, EventSink};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Outcome of dispatching one event
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub kind: EventKind,
    pub device_id: String,
    pub channels: Vec<ChannelReport>,
}

impl DispatchReport {
    /// Report for a channel by name
    pub fn channel(&self, name: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|r| r.channel == name)
    }

    pub fn delivered_count(&self) -> usize {
        self.channels.iter().filter(|r| r.is_delivered()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|r| !r.is_delivered() && !r.is_skipped())
            .count()
    }
}

/// Routes events to all registered channels
pub struct NotificationDispatcher {
    /// Registered channels, in registration order
    channels: Vec<Arc<Channel>>,
    /// Consulted once per dispatch
    config: Arc<dyn ConfigProvider>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with no channels
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            channels: Vec::new(),
            config,
        }
    }

    /// Register a channel
    pub fn register_channel(&mut self, channel: Channel) {
        info!(channel = channel.name(), "Registering notification channel");
        self.channels.push(Arc::new(channel));
    }

    /// Builder-style [`register_channel`](Self::register_channel)
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.register_channel(channel);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver an event on every channel concurrently.
    ///
    /// Never fails: each channel's result, including panics inside its
    /// transport, ends up in the returned report.
    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let config = self.config.current();

        let channels = if !config.alerts_enabled {
            debug!(kind = %event.kind, device = %event.device_id, "Alerts disabled, skipping dispatch");
            self.channels
                .iter()
                .map(|c| ChannelReport::skipped(c.name(), "alerts disabled"))
                .collect()
        } else {
            let mut tasks = JoinSet::new();
            for (index, channel) in self.channels.iter().enumerate() {
                let channel = channel.clone();
                let event = event.clone();
                let channel_config = config.channel(channel.name()).cloned();
                tasks.spawn(async move {
                    let report = channel.deliver(&event, channel_config.as_ref()).await;
                    (index, report)
                });
            }

            let mut slots: Vec<Option<ChannelReport>> = vec![None; self.channels.len()];
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, report)) => slots[index] = Some(report),
                    Err(e) => error!(error = %e, "Channel delivery task failed"),
                }
            }

            slots
                .into_iter()
                .zip(&self.channels)
                .map(|(slot, channel)| {
                    slot.unwrap_or_else(|| ChannelReport::failed(channel.name(), "delivery task aborted", false, 0))
                })
                .collect()
        };

        let report = DispatchReport {
            kind: event.kind,
            device_id: event.device_id.clone(),
            channels,
        };
        record_metrics(&report);
        report
    }
}

fn record_metrics(report: &DispatchReport) {
    for channel in &report.channels {
        metrics::counter!(
            "sensor_watch_notifications_total",
            "channel" => channel.channel.clone(),
            "outcome" => channel.outcome.label()
        )
        .increment(1);
    }
}

#[async_trait]
impl EventSink for NotificationDispatcher {
    async fn publish(&self, event: &AlertEvent) {
        let report = self.dispatch(event).await;
        if report.failed_count() > 0 {
            warn!(
                kind = %report.kind,
                device = %report.device_id,
                delivered = report.delivered_count(),
                failed = report.failed_count(),
                "Event dispatched with failures"
            );
        } else {
            debug!(
                kind = %report.kind,
                device = %report.device_id,
                delivered = report.delivered_count(),
                "Event dispatched"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryOutcome;
    use crate::render::{RenderStyle, RenderedPayload};
    use crate::retry::RetryPolicy;
    use crate::transport::{SendOutcome, Transport};
    use alerting::{Bounds, ChannelConfig, RuntimeConfig, SharedConfig, StaticConfig};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Transport that replays scripted outcomes, then delivers
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<SendOutcome>>,
        calls: AtomicU32,
        delay: Option<Duration>,
        payloads: Mutex<Vec<RenderedPayload>>,
    }

    impl ScriptedTransport {
        fn with_script(outcomes: Vec<SendOutcome>) -> Self {
            Self {
                script: Mutex::new(outcomes.into()),
                ..Default::default()
            }
        }

        fn hanging(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, payload: &RenderedPayload, _config: &ChannelConfig) -> SendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SendOutcome::Delivered)
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl Transport for PanickingTransport {
        async fn send(&self, _payload: &RenderedPayload, _config: &ChannelConfig) -> SendOutcome {
            panic!("transport bug");
        }
    }

    fn enabled(destination: &str) -> ChannelConfig {
        ChannelConfig {
            enabled: true,
            destinations: vec![destination.to_string()],
            ..Default::default()
        }
    }

    fn config_with(channels: &[(&str, ChannelConfig)]) -> RuntimeConfig {
        RuntimeConfig {
            channels: channels
                .iter()
                .map(|(name, cfg)| (name.to_string(), cfg.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn event() -> AlertEvent {
        AlertEvent::new(EventKind::Alert, "freezer-1", Bounds::default(), 0).with_temperature(-60.0)
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_skipped() {
        let transport = Arc::new(ScriptedTransport::default());
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig::default()))
            .with_channel(Channel::new("email", RenderStyle::Mail, transport.clone()));

        let report = dispatcher.dispatch(&event()).await;

        let email = report.channel("email").unwrap();
        assert!(email.is_skipped());
        assert_eq!(email.attempts, 0);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_destination_is_skipped() {
        let transport = Arc::new(ScriptedTransport::default());
        let config = config_with(&[(
            "webhook",
            ChannelConfig {
                enabled: true,
                ..Default::default()
            },
        )]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, transport.clone()));

        let report = dispatcher.dispatch(&event()).await;
        assert!(report.channels[0].is_skipped());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_alerts_disabled_skips_everything() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut config = config_with(&[("email", enabled("ops@example.com"))]);
        config.alerts_enabled = false;
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("email", RenderStyle::Mail, transport.clone()));

        let report = dispatcher.dispatch(&event()).await;
        assert_eq!(
            report.channels[0].outcome,
            DeliveryOutcome::Skipped {
                reason: "alerts disabled".to_string()
            }
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_each_channel_gets_its_rendering() {
        let mail = Arc::new(ScriptedTransport::default());
        let chat = Arc::new(ScriptedTransport::default());
        let config = config_with(&[
            ("email", enabled("ops@example.com")),
            ("webhook", enabled("https://chat.example.com/hook")),
        ]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("email", RenderStyle::Mail, mail.clone()))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, chat.clone()));

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report.delivered_count(), 2);
        assert_eq!(dispatcher.channel_names(), vec!["email", "webhook"]);
        assert!(matches!(mail.payloads.lock().unwrap()[0], RenderedPayload::Mail(_)));
        assert!(matches!(chat.payloads.lock().unwrap()[0], RenderedPayload::Structured(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_per_channel() {
        let broken = Arc::new(ScriptedTransport::with_script(vec![SendOutcome::Permanent(
            "HTTP 404".to_string(),
        )]));
        let healthy = Arc::new(ScriptedTransport::default());
        let config = config_with(&[
            ("webhook", enabled("https://chat.example.com/hook")),
            ("email", enabled("ops@example.com")),
        ]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, broken.clone()))
            .with_channel(Channel::new("email", RenderStyle::Mail, healthy.clone()));

        let report = dispatcher.dispatch(&event()).await;

        let webhook = report.channel("webhook").unwrap();
        assert_eq!(
            webhook.outcome,
            DeliveryOutcome::Failed {
                detail: "HTTP 404".to_string(),
                retryable: false
            }
        );
        assert_eq!(webhook.attempts, 1);
        assert!(report.channel("email").unwrap().is_delivered());
        assert_eq!(healthy.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![SendOutcome::transient(
            "HTTP 503",
        )]));
        let config = config_with(&[("webhook", enabled("https://chat.example.com/hook"))]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, transport.clone()));

        let report = dispatcher.dispatch(&event()).await;

        assert!(report.channels[0].is_delivered());
        assert_eq!(report.channels[0].attempts, 2);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_bounded() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![
            SendOutcome::transient("HTTP 502"),
            SendOutcome::transient("HTTP 502"),
            SendOutcome::transient("HTTP 502"),
        ]));
        let config = config_with(&[("webhook", enabled("https://chat.example.com/hook"))]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, transport.clone()));

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(
            report.channels[0].outcome,
            DeliveryOutcome::Failed {
                detail: "HTTP 502".to_string(),
                retryable: true
            }
        );
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_retry_delay_is_honoured() {
        let transport = Arc::new(ScriptedTransport::with_script(vec![SendOutcome::Transient {
            detail: "HTTP 429".to_string(),
            retry_after: Some(Duration::from_secs(5)),
        }]));
        let config = config_with(&[("webhook", enabled("https://chat.example.com/hook"))]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, transport.clone()));

        let start = Instant::now();
        let report = dispatcher.dispatch(&event()).await;

        assert!(report.channels[0].is_delivered());
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transport_times_out() {
        let transport = Arc::new(ScriptedTransport::hanging(Duration::from_secs(3600)));
        let config = config_with(&[("email", enabled("ops@example.com"))]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config))).with_channel(
            Channel::new("email", RenderStyle::Mail, transport.clone()).with_retry(RetryPolicy {
                jitter: 0.0,
                ..Default::default()
            }),
        );

        let start = Instant::now();
        let report = dispatcher.dispatch(&event()).await;

        match &report.channels[0].outcome {
            DeliveryOutcome::Failed { detail, retryable } => {
                assert!(detail.contains("timed out"));
                assert!(retryable);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(transport.calls(), 2);
        // two 15 s attempts plus one 1 s backoff
        assert!(start.elapsed() >= Duration::from_secs(31));
        assert!(start.elapsed() < Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_delays_second_post() {
        let transport = Arc::new(ScriptedTransport::default());
        let config = config_with(&[(
            "webhook",
            ChannelConfig {
                min_interval_ms: 2_000,
                ..enabled("https://chat.example.com/hook")
            },
        )]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("webhook", RenderStyle::Structured, transport.clone()));

        let start = Instant::now();
        dispatcher.dispatch(&event()).await;
        let second = dispatcher.dispatch(&event()).await;

        assert!(second.channels[0].is_delivered());
        assert_eq!(transport.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_config_changes_apply_to_next_event() {
        let transport = Arc::new(ScriptedTransport::default());
        let shared = SharedConfig::new(config_with(&[("email", enabled("ops@example.com"))]));
        let dispatcher = NotificationDispatcher::new(Arc::new(shared.clone()))
            .with_channel(Channel::new("email", RenderStyle::Mail, transport.clone()));

        assert!(dispatcher.dispatch(&event()).await.channels[0].is_delivered());

        shared.update(|cfg| {
            if let Some(email) = cfg.channels.get_mut("email") {
                email.enabled = false;
            }
        });
        assert!(dispatcher.dispatch(&event()).await.channels[0].is_skipped());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_panicking_transport_is_contained() {
        let healthy = Arc::new(ScriptedTransport::default());
        let config = config_with(&[
            ("broken", enabled("https://chat.example.com/hook")),
            ("email", enabled("ops@example.com")),
        ]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("broken", RenderStyle::Structured, Arc::new(PanickingTransport)))
            .with_channel(Channel::new("email", RenderStyle::Mail, healthy.clone()));

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.channels[0].channel, "broken");
        assert!(report.channels[1].is_delivered());
    }

    #[tokio::test]
    async fn test_dispatcher_as_event_sink() {
        let transport = Arc::new(ScriptedTransport::default());
        let config = config_with(&[("email", enabled("ops@example.com"))]);
        let dispatcher = NotificationDispatcher::new(Arc::new(StaticConfig(config)))
            .with_channel(Channel::new("email", RenderStyle::Mail, transport.clone()));
        let sink: Arc<dyn EventSink> = Arc::new(dispatcher);

        sink.publish(&event()).await;
        assert_eq!(transport.calls(), 1);
    }
}
