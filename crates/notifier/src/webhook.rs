//! Chat Webhook Transport
//!
//! [`WebhookTransport`] posts a structured message as a JSON embed to the
//! channel's webhook URL. The HTTP status decides whether a failure is worth
//! retrying; 429 responses carry the server's requested delay.

use crate::error::NotifyError;
use crate::render::{RenderedPayload, StructuredMessage};
use crate::transport::{SendOutcome, Transport};
use alerting::ChannelConfig;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use tracing::debug;

/// Outer HTTP timeout; the channel's attempt timeout is normally shorter
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest response body excerpt kept in failure details
const DETAIL_LIMIT: usize = 200;

/// Delivers structured messages to a chat webhook
pub struct WebhookTransport {
    client: reqwest::Client,
}

impl WebhookTransport {
    /// Create a transport with a pre-configured HTTP client
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, payload: &RenderedPayload, config: &ChannelConfig) -> SendOutcome {
        let RenderedPayload::Structured(message) = payload else {
            return SendOutcome::Permanent("webhook channel needs a structured payload".to_string());
        };
        let Some(raw_url) = config.destinations.iter().map(|d| d.trim()).find(|d| !d.is_empty()) else {
            return SendOutcome::Skipped("no webhook url configured".to_string());
        };

        let mut url = match reqwest::Url::parse(raw_url) {
            Ok(url) => url,
            Err(e) => return SendOutcome::Permanent(format!("malformed webhook url: {e}")),
        };
        if let Some(thread_id) = config.thread_id.as_deref().filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("thread_id", thread_id);
        }

        let response = match self.client.post(url).json(&embed_body(message)).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return SendOutcome::Permanent(format!("invalid request: {e}")),
            Err(e) => return SendOutcome::transient(format!("request failed: {e}")),
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            debug!(status, "Webhook accepted message");
            return SendOutcome::Delivered;
        }

        let retry_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();
        classify_status(status, retry_header.as_deref(), &body)
    }
}

/// JSON body understood by embed-style chat webhooks
pub fn embed_body(message: &StructuredMessage) -> serde_json::Value {
    serde_json::json!({
        "embeds": [{
            "title": message.title,
            "description": message.description,
            "color": message.color,
            "timestamp": message.timestamp,
            "fields": message.fields.iter().map(|f| serde_json::json!({
                "name": f.name,
                "value": f.value,
                "inline": f.inline,
            })).collect::<Vec<_>>(),
        }]
    })
}

/// Map a non-2xx webhook response to an outcome.
///
/// 429, 408 and 5xx are transient; every other status is permanent.
pub fn classify_status(status: u16, retry_after_header: Option<&str>, body: &str) -> SendOutcome {
    let excerpt: String = body.chars().take(DETAIL_LIMIT).collect();
    let detail = if excerpt.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {excerpt}")
    };

    match status {
        429 => SendOutcome::Transient {
            detail,
            retry_after: parse_retry_after(retry_after_header, body),
        },
        408 | 500..=599 => SendOutcome::Transient {
            detail,
            retry_after: parse_retry_after(retry_after_header, ""),
        },
        _ => SendOutcome::Permanent(detail),
    }
}

/// Server-requested delay from a `Retry-After` header (seconds) or a JSON
/// body with a `retry_after` field (seconds, may be fractional)
pub fn parse_retry_after(header: Option<&str>, body: &str) -> Option<Duration> {
    let from_header = header.and_then(|h| h.trim().parse::<f64>().ok());
    let from_body = || {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("retry_after")?
            .as_f64()
    };

    from_header
        .or_else(from_body)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
