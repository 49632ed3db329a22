//! Alert Event Model

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Kind of notification produced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Temperature left the configured bounds
    Alert,
    /// Temperature returned inside the bounds after an alert
    Recover,
    /// Device reported a non-zero fault register
    Fault,
    /// Device stopped reporting
    Offline,
    /// Device reported again after being offline
    Online,
    /// Operator-triggered liveness notice
    Heartbeat,
}

impl EventKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Alert => "alert",
            EventKind::Recover => "recover",
            EventKind::Fault => "fault",
            EventKind::Offline => "offline",
            EventKind::Online => "online",
            EventKind::Heartbeat => "heartbeat",
        }
    }

    /// Parse a lowercase name back into a kind
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "alert" => Some(EventKind::Alert),
            "recover" => Some(EventKind::Recover),
            "fault" => Some(EventKind::Fault),
            "offline" => Some(EventKind::Offline),
            "online" => Some(EventKind::Online),
            "heartbeat" => Some(EventKind::Heartbeat),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acceptable temperature range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Whether a temperature lies inside `[lower, upper]`
    pub fn contains(&self, temperature: f64) -> bool {
        !(temperature < self.lower || temperature > self.upper)
    }

    /// Resolve per-reading bounds against the process-wide default pair.
    ///
    /// A missing or non-finite side is taken from `default`. If the result is
    /// inverted the whole default pair is used instead.
    pub fn resolve(lower: Option<f64>, upper: Option<f64>, default: Bounds) -> Bounds {
        let lower = lower.filter(|v| v.is_finite()).unwrap_or(default.lower);
        let upper = upper.filter(|v| v.is_finite()).unwrap_or(default.upper);

        if lower > upper {
            warn!(lower, upper, "Inverted bounds, falling back to defaults");
            return default;
        }

        Bounds { lower, upper }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: -90.0,
            upper: -70.0,
        }
    }
}

/// A single notification-worthy occurrence for one device.
///
/// Carries the bounds that were in effect when it was generated so channel
/// renderings stay consistent even if configuration changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: EventKind,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_code: Option<u32>,
    pub bounds: Bounds,
    pub timestamp_ms: i64,
}

impl AlertEvent {
    /// Create an event of the given kind with no reading attached
    pub fn new(kind: EventKind, device_id: impl Into<String>, bounds: Bounds, timestamp_ms: i64) -> Self {
        Self {
            kind,
            device_id: device_id.into(),
            temperature: None,
            fault_code: None,
            bounds,
            timestamp_ms,
        }
    }

    /// Attach the temperature that triggered the event
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Attach the fault register value
    pub fn with_fault_code(mut self, fault_code: u32) -> Self {
        self.fault_code = Some(fault_code);
        self
    }

    /// Operator liveness notice, not tied to a reading
    pub fn heartbeat(source: impl Into<String>, bounds: Bounds, timestamp_ms: i64) -> Self {
        Self::new(EventKind::Heartbeat, source, bounds, timestamp_ms)
    }
}
