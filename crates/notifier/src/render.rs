//! Channel Payload Rendering
//!
//! Pure functions from an [`AlertEvent`] to the payload a channel sends.

use alerting::{AlertEvent, Bounds, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const FIELD_DEVICE: &str = "Device";
const FIELD_EVENT: &str = "Event";
const FIELD_LOWER: &str = "Lower bound";
const FIELD_UPPER: &str = "Upper bound";
const FIELD_TEMPERATURE: &str = "Temperature";
const FIELD_FAULT: &str = "Fault code";
const FIELD_TIME: &str = "Time";

/// Subject/body message for mail-like channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// One name/value pair of a structured message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Title/description/fields message for chat channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMessage {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<Field>,
}

impl StructuredMessage {
    /// Value of the first field with the given name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Payload handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedPayload {
    Mail(MailMessage),
    Structured(StructuredMessage),
}

/// How a channel renders events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    Mail,
    Structured,
}

impl RenderStyle {
    pub fn render(&self, event: &AlertEvent) -> RenderedPayload {
        match self {
            RenderStyle::Mail => RenderedPayload::Mail(render_mail(event)),
            RenderStyle::Structured => RenderedPayload::Structured(render_structured(event)),
        }
    }
}

/// The identifying part of an event, recoverable from a rendered payload
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub device_id: String,
    pub kind: EventKind,
    pub bounds: Bounds,
}

impl EventSummary {
    pub fn of(event: &AlertEvent) -> Self {
        Self {
            device_id: event.device_id.clone(),
            kind: event.kind,
            bounds: event.bounds,
        }
    }

    /// Parse the summary back out of a structured message
    pub fn from_structured(message: &StructuredMessage) -> Option<Self> {
        Some(Self {
            device_id: message.field(FIELD_DEVICE)?.to_string(),
            kind: EventKind::parse(message.field(FIELD_EVENT)?)?,
            bounds: Bounds::new(
                message.field(FIELD_LOWER)?.parse().ok()?,
                message.field(FIELD_UPPER)?.parse().ok()?,
            ),
        })
    }
}

fn headline(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Alert => "Temperature out of range",
        EventKind::Recover => "Temperature back in range",
        EventKind::Fault => "Sensor fault",
        EventKind::Offline => "Device offline",
        EventKind::Online => "Device back online",
        EventKind::Heartbeat => "Notification test",
    }
}

fn color(kind: EventKind) -> u32 {
    match kind {
        EventKind::Alert | EventKind::Fault => 0xE0_3E_3E,
        EventKind::Offline => 0xF0_A0_20,
        EventKind::Recover | EventKind::Online => 0x2E_B8_6E,
        EventKind::Heartbeat => 0x3B_82_F6,
    }
}

fn format_time(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn describe(event: &AlertEvent) -> String {
    let Bounds { lower, upper } = event.bounds;
    let id = &event.device_id;
    match (event.kind, event.temperature, event.fault_code) {
        (EventKind::Alert, Some(t), _) => {
            format!("{id} reported {t:.1} °C, outside the allowed range {lower} to {upper} °C.")
        }
        (EventKind::Recover, Some(t), _) => {
            format!("{id} reported {t:.1} °C and is back within {lower} to {upper} °C.")
        }
        (EventKind::Fault, _, Some(code)) => {
            format!("{id} reported fault code 0x{code:02X}; its temperature reading is unreliable.")
        }
        (EventKind::Offline, _, _) => {
            format!("{id} has not reported within the expected interval.")
        }
        (EventKind::Online, _, _) => format!("{id} is reporting again."),
        (EventKind::Heartbeat, _, _) => format!("Test notification from {id}."),
        (kind, _, _) => format!("{id}: {kind}"),
    }
}

/// Render an event for a mail-like channel
pub fn render_mail(event: &AlertEvent) -> MailMessage {
    let subject = format!(
        "[sensor-watch] {} {}: {}",
        event.kind.as_str().to_uppercase(),
        event.device_id,
        headline(event.kind)
    );

    let mut body = format!("{}\n\n", describe(event));
    body.push_str(&format!("{FIELD_DEVICE}: {}\n", event.device_id));
    body.push_str(&format!("{FIELD_EVENT}: {}\n", event.kind));
    if let Some(t) = event.temperature {
        body.push_str(&format!("{FIELD_TEMPERATURE}: {t} °C\n"));
    }
    if let Some(code) = event.fault_code {
        body.push_str(&format!("{FIELD_FAULT}: 0x{code:02X}\n"));
    }
    body.push_str(&format!(
        "Bounds: {} to {} °C\n",
        event.bounds.lower, event.bounds.upper
    ));
    body.push_str(&format!("{FIELD_TIME}: {}\n", format_time(event.timestamp_ms)));

    MailMessage { subject, body }
}

/// Render an event for a structured chat channel
pub fn render_structured(event: &AlertEvent) -> StructuredMessage {
    let field = |name: &str, value: String| Field {
        name: name.to_string(),
        value,
        inline: true,
    };

    let mut fields = vec![
        field(FIELD_DEVICE, event.device_id.clone()),
        field(FIELD_EVENT, event.kind.as_str().to_string()),
    ];
    if let Some(t) = event.temperature {
        fields.push(field(FIELD_TEMPERATURE, t.to_string()));
    }
    if let Some(code) = event.fault_code {
        fields.push(field(FIELD_FAULT, format!("0x{code:02X}")));
    }
    fields.push(field(FIELD_LOWER, event.bounds.lower.to_string()));
    fields.push(field(FIELD_UPPER, event.bounds.upper.to_string()));

    StructuredMessage {
        title: format!("{}: {}", headline(event.kind), event.device_id),
        description: describe(event),
        color: color(event.kind),
        timestamp: format_time(event.timestamp_ms),
        fields,
    }
}
