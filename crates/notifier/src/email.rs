//! Email notification delivery via SMTP.
//!
//! [`EmailTransport`] wraps the `lettre` async SMTP transport and sends one
//! plain-text message per event to every configured recipient.

use crate::error::NotifyError;
use crate::render::{MailMessage, RenderedPayload};
use crate::transport::{SendOutcome, Transport};
use alerting::ChannelConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// SmtpSettings
// ---------------------------------------------------------------------------

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (STARTTLS, default: 587)
    #[serde(default = "default_port")]
    pub port: u16,
    /// RFC 5322 "From" address
    #[serde(default = "default_from")]
    pub from_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_port() -> u16 {
    587
}

fn default_from() -> String {
    "Sensor Watch <noreply@sensor-watch.local>".to_string()
}

// ---------------------------------------------------------------------------
// EmailTransport
// ---------------------------------------------------------------------------

/// Sends rendered mail messages through an SMTP relay
pub struct EmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailTransport {
    /// Build the relay transport; no connection is made until the first send
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from: Mailbox = settings.from_address.parse()?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?.port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

/// Assemble a plain-text message addressed to every recipient
pub fn compose_email(from: &Mailbox, mail: &MailMessage, recipients: &[String]) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN);

    for recipient in recipients.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        builder = builder.to(recipient.parse::<Mailbox>()?);
    }

    builder
        .body(mail.body.clone())
        .map_err(|e| NotifyError::Build(e.to_string()))
}

#[async_trait]
impl Transport for EmailTransport {
    async fn send(&self, payload: &RenderedPayload, config: &ChannelConfig) -> SendOutcome {
        let RenderedPayload::Mail(mail) = payload else {
            return SendOutcome::Permanent("email channel needs a mail payload".to_string());
        };

        let message = match compose_email(&self.from, mail, &config.destinations) {
            Ok(message) => message,
            Err(e) => return SendOutcome::Permanent(e.to_string()),
        };

        match self.mailer.send(message).await {
            Ok(response) => {
                debug!(code = %response.code(), "SMTP relay accepted message");
                SendOutcome::Delivered
            }
            Err(e) if e.is_permanent() => SendOutcome::Permanent(format!("SMTP rejected message: {e}")),
            Err(e) => SendOutcome::transient(format!("SMTP error: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> MailMessage {
        MailMessage {
            subject: "[sensor-watch] ALERT freezer-1: Temperature out of range".to_string(),
            body: "freezer-1 reported -60.0 °C".to_string(),
        }
    }

    fn sender() -> Mailbox {
        default_from().parse().unwrap()
    }

    #[test]
    fn test_compose_addresses_every_recipient() {
        let recipients = vec![
            "ops@example.com".to_string(),
            " ".to_string(),
            "Lab Manager <lab@example.com>".to_string(),
        ];
        let message = compose_email(&sender(), &mail(), &recipients).unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn test_compose_rejects_bad_address() {
        let err = compose_email(&sender(), &mail(), &["not-an-email".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn test_compose_requires_a_recipient() {
        let err = compose_email(&sender(), &mail(), &[]).unwrap_err();
        assert!(matches!(err, NotifyError::Build(_)));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: SmtpSettings = serde_json::from_str(r#"{"host":"smtp.example.com"}"#).unwrap();
        assert_eq!(settings.port, 587);
        assert!(settings.from_address.contains("noreply@"));
        assert!(settings.username.is_none());
    }

    #[test]
    fn test_error_display_build() {
        let err = NotifyError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
