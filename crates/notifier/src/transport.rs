//! Transport Contract

use crate::render::RenderedPayload;
use alerting::ChannelConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Accepted by the remote side
    Delivered,
    /// Nothing to do (no destination)
    Skipped(String),
    /// Worth retrying, optionally after a server-provided delay
    Transient {
        detail: String,
        retry_after: Option<Duration>,
    },
    /// Retrying will not help
    Permanent(String),
}

impl SendOutcome {
    pub fn transient(detail: impl Into<String>) -> Self {
        SendOutcome::Transient {
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SendOutcome::Transient { .. })
    }
}

/// Delivers a rendered payload to one channel's destination.
///
/// A single call is one attempt; retry and timeout policy live in
/// [`Channel`](crate::Channel).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &RenderedPayload, config: &ChannelConfig) -> SendOutcome;
}
