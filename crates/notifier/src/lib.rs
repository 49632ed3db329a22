//! Notification Delivery
//!
//! Renders alert events per channel and delivers them with:
//! - Concurrent fan-out, one failing channel never blocks another
//! - Bounded retry with exponential backoff or server-provided delay
//! - Per-channel minimum gap between posts
//! - Webhook (HTTP) and email (SMTP) transports

mod channel;
mod dispatcher;
mod email;
mod error;
mod rate_limit;
mod render;
mod retry;
mod transport;
mod webhook;

pub use channel::{Channel, ChannelReport, DeliveryOutcome};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use email::{compose_email, EmailTransport, SmtpSettings};
pub use error::NotifyError;
pub use rate_limit::RateLimiter;
pub use render::{
    render_mail, render_structured, EventSummary, Field, MailMessage, RenderStyle, RenderedPayload,
    StructuredMessage,
};
pub use retry::RetryPolicy;
pub use transport::{SendOutcome, Transport};
pub use webhook::{classify_status, embed_body, parse_retry_after, WebhookTransport};

/// Channel name for email delivery
pub const EMAIL_CHANNEL: &str = "email";

/// Channel name for chat webhook delivery
pub const WEBHOOK_CHANNEL: &str = "webhook";
