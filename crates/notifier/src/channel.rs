//! Notification Channel
//!
//! Couples a renderer, a transport, a retry policy, and a rate limiter.

use crate::rate_limit::RateLimiter;
use crate::render::{RenderStyle, RenderedPayload};
use crate::retry::RetryPolicy;
use crate::transport::{SendOutcome, Transport};
use alerting::{AlertEvent, ChannelConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Final outcome of delivering one event on one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Skipped { reason: String },
    Failed { detail: String, retryable: bool },
}

impl DeliveryOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Skipped { .. } => "skipped",
            DeliveryOutcome::Failed { retryable: true, .. } => "transient_failure",
            DeliveryOutcome::Failed { retryable: false, .. } => "permanent_failure",
        }
    }
}

/// Per-channel delivery report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    pub channel: String,
    pub outcome: DeliveryOutcome,
    /// Transport calls made
    pub attempts: u32,
}

impl ChannelReport {
    pub fn skipped(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            outcome: DeliveryOutcome::Skipped {
                reason: reason.into(),
            },
            attempts: 0,
        }
    }

    pub fn failed(channel: impl Into<String>, detail: impl Into<String>, retryable: bool, attempts: u32) -> Self {
        Self {
            channel: channel.into(),
            outcome: DeliveryOutcome::Failed {
                detail: detail.into(),
                retryable,
            },
            attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Skipped { .. })
    }
}

/// A named delivery route
pub struct Channel {
    name: String,
    style: RenderStyle,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl Channel {
    /// Create a channel with the default retry policy
    pub fn new(name: impl Into<String>, style: RenderStyle, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            style,
            transport,
            retry: RetryPolicy::default(),
            limiter: RateLimiter::new(),
        }
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, event: &AlertEvent) -> RenderedPayload {
        self.style.render(event)
    }

    /// Deliver one event, retrying transient failures within the policy budget.
    ///
    /// `config` is the channel's configuration at dispatch time; a missing,
    /// disabled, or destination-less channel is skipped without touching the
    /// transport.
    pub async fn deliver(&self, event: &AlertEvent, config: Option<&ChannelConfig>) -> ChannelReport {
        let config = match config {
            Some(config) if config.is_deliverable() => config,
            Some(config) if !config.enabled => {
                debug!(channel = %self.name, "Channel disabled, skipping");
                return ChannelReport::skipped(&self.name, "channel disabled");
            }
            _ => {
                debug!(channel = %self.name, "Channel has no destination, skipping");
                return ChannelReport::skipped(&self.name, "no destination configured");
            }
        };

        let payload = self.render(event);
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.limiter.acquire(config.min_interval()).await;

            let outcome = match tokio::time::timeout(
                self.retry.attempt_timeout(),
                self.transport.send(&payload, config),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => SendOutcome::transient(format!(
                    "timed out after {} ms",
                    self.retry.attempt_timeout_ms
                )),
            };

            match outcome {
                SendOutcome::Delivered => {
                    info!(
                        channel = %self.name,
                        device = %event.device_id,
                        kind = %event.kind,
                        attempt,
                        "Notification delivered"
                    );
                    return ChannelReport {
                        channel: self.name.clone(),
                        outcome: DeliveryOutcome::Delivered,
                        attempts: attempt,
                    };
                }
                SendOutcome::Skipped(reason) => {
                    debug!(channel = %self.name, %reason, "Transport skipped delivery");
                    return ChannelReport {
                        attempts: attempt,
                        ..ChannelReport::skipped(&self.name, reason)
                    };
                }
                SendOutcome::Permanent(detail) => {
                    error!(
                        channel = %self.name,
                        device = %event.device_id,
                        kind = %event.kind,
                        %detail,
                        "Notification rejected"
                    );
                    return ChannelReport::failed(&self.name, detail, false, attempt);
                }
                SendOutcome::Transient { detail, retry_after } => {
                    if attempt == max_attempts {
                        warn!(
                            channel = %self.name,
                            device = %event.device_id,
                            kind = %event.kind,
                            attempts = attempt,
                            %detail,
                            "Notification failed after all retries"
                        );
                        return ChannelReport::failed(&self.name, detail, true, attempt);
                    }

                    let delay = self.retry.next_delay(attempt, retry_after);
                    warn!(
                        channel = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %detail,
                        "Delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        ChannelReport::failed(&self.name, "retry budget exhausted", true, max_attempts)
    }
}
