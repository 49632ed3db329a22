//! Per-Device State Machine

use crate::config::Thresholds;
use crate::event::{AlertEvent, Bounds, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Current classification of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Normal,
    Alert,
    Fault,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Normal => "normal",
            DeviceStatus::Alert => "alert",
            DeviceStatus::Fault => "fault",
            DeviceStatus::Offline => "offline",
        }
    }
}

/// Named cooldown timer, one per notification kind the state machine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownBucket {
    Alert,
    Fault,
    Offline,
    Online,
    Recover,
}

/// Last-fired timestamps per cooldown bucket.
///
/// A bucket's entry changes only when an event of that bucket is let through.
#[derive(Debug, Clone, Default)]
pub struct CooldownLedger {
    last_fired: HashMap<CooldownBucket, i64>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set: returns `true` when the bucket fired within `window_ms`.
    ///
    /// A `false` result has already consumed the bucket at `now_ms`; callers
    /// must not check the same bucket twice for one decision.
    pub fn should_suppress(&mut self, bucket: CooldownBucket, now_ms: i64, window_ms: i64) -> bool {
        !self.gate(bucket, now_ms, window_ms, false)
    }

    /// Test-and-set with an override. Returns whether the event may fire and
    /// stamps the bucket with `now_ms` when it does.
    pub fn gate(&mut self, bucket: CooldownBucket, now_ms: i64, window_ms: i64, force: bool) -> bool {
        let cooling = self
            .last_fired
            .get(&bucket)
            .is_some_and(|&last| now_ms.saturating_sub(last) < window_ms);

        if cooling && !force {
            debug!(?bucket, "Suppressed by cooldown");
            return false;
        }

        self.last_fired.insert(bucket, now_ms);
        true
    }

    /// When the bucket last let an event through
    pub fn last_fired(&self, bucket: CooldownBucket) -> Option<i64> {
        self.last_fired.get(&bucket).copied()
    }
}

/// Classify a single reading. A fault pre-empts the bounds check because the
/// temperature of a faulty sensor is not trustworthy.
pub fn classify(temperature: f64, fault_code: u32, bounds: Bounds) -> DeviceStatus {
    if fault_code != 0 {
        DeviceStatus::Fault
    } else if !bounds.contains(temperature) {
        DeviceStatus::Alert
    } else {
        DeviceStatus::Normal
    }
}

/// Read-only view of a device for status reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub status: DeviceStatus,
    pub last_temperature: Option<f64>,
    pub last_seen_ms: Option<i64>,
    pub last_fault_code: u32,
}

/// Alerting state of one device
#[derive(Debug, Clone)]
pub struct DeviceState {
    id: String,
    status: DeviceStatus,
    last_temperature: Option<f64>,
    last_reading_at: Option<i64>,
    last_fault_code: u32,
    last_bounds: Bounds,
    cooldowns: CooldownLedger,
}

impl DeviceState {
    /// Fresh device, `normal` until its first reading says otherwise
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DeviceStatus::Normal,
            last_temperature: None,
            last_reading_at: None,
            last_fault_code: 0,
            last_bounds: Bounds::default(),
            cooldowns: CooldownLedger::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn last_temperature(&self) -> Option<f64> {
        self.last_temperature
    }

    pub fn last_reading_at(&self) -> Option<i64> {
        self.last_reading_at
    }

    pub fn cooldowns(&self) -> &CooldownLedger {
        &self.cooldowns
    }

    /// Apply a reading and return the events it produces.
    ///
    /// Events are decided from the state as it was before this reading; the
    /// reading is committed afterwards.
    pub fn on_reading(
        &mut self,
        temperature: f64,
        fault_code: u32,
        bounds: Bounds,
        now_ms: i64,
        thresholds: &Thresholds,
    ) -> Vec<AlertEvent> {
        let cooldown = thresholds.cooldown_ms();
        let was_status = self.status;
        let status_now = classify(temperature, fault_code, bounds);
        let mut events = Vec::new();

        if was_status == DeviceStatus::Offline
            && self.cooldowns.gate(CooldownBucket::Online, now_ms, cooldown, false)
        {
            events.push(self.event(EventKind::Online, bounds, now_ms).with_temperature(temperature));
        }

        match status_now {
            DeviceStatus::Fault => {
                let fresh = was_status != DeviceStatus::Fault;
                if self.cooldowns.gate(CooldownBucket::Fault, now_ms, cooldown, fresh) {
                    events.push(
                        self.event(EventKind::Fault, bounds, now_ms)
                            .with_temperature(temperature)
                            .with_fault_code(fault_code),
                    );
                }
            }
            DeviceStatus::Alert => {
                let spike = self
                    .last_temperature
                    .is_some_and(|prev| (temperature - prev).abs() >= thresholds.spike_threshold);
                let fresh = was_status != DeviceStatus::Alert;
                if self.cooldowns.gate(CooldownBucket::Alert, now_ms, cooldown, spike || fresh) {
                    events.push(self.event(EventKind::Alert, bounds, now_ms).with_temperature(temperature));
                }
            }
            DeviceStatus::Normal if was_status == DeviceStatus::Alert => {
                if self.cooldowns.gate(CooldownBucket::Recover, now_ms, cooldown, false) {
                    events.push(self.event(EventKind::Recover, bounds, now_ms).with_temperature(temperature));
                }
            }
            _ => {}
        }

        if was_status != status_now {
            info!(
                device = %self.id,
                from = was_status.as_str(),
                to = status_now.as_str(),
                temperature,
                fault_code,
                "Device status changed"
            );
        }

        self.last_temperature = Some(temperature);
        self.last_fault_code = fault_code;
        self.last_reading_at = Some(now_ms);
        self.last_bounds = bounds;
        self.status = status_now;

        events
    }

    /// Mark the device offline when it has been silent for `offline_after_ms`.
    ///
    /// Returns the `offline` event if its cooldown allows one. The status moves
    /// to `offline` either way; the last temperature is kept.
    pub fn on_heartbeat(&mut self, now_ms: i64, offline_after_ms: i64, cooldown_ms: i64) -> Option<AlertEvent> {
        if self.status == DeviceStatus::Offline {
            return None;
        }
        let last_seen = self.last_reading_at?;
        if now_ms.saturating_sub(last_seen) < offline_after_ms {
            return None;
        }

        info!(device = %self.id, last_seen_ms = last_seen, "Device went offline");
        let allowed = self.cooldowns.gate(CooldownBucket::Offline, now_ms, cooldown_ms, false);
        self.status = DeviceStatus::Offline;

        allowed.then(|| {
            let event = self.event(EventKind::Offline, self.last_bounds, now_ms);
            match self.last_temperature {
                Some(t) => event.with_temperature(t),
                None => event,
            }
        })
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id.clone(),
            status: self.status,
            last_temperature: self.last_temperature,
            last_seen_ms: self.last_reading_at,
            last_fault_code: self.last_fault_code,
        }
    }

    fn event(&self, kind: EventKind, bounds: Bounds, now_ms: i64) -> AlertEvent {
        AlertEvent::new(kind, self.id.clone(), bounds, now_ms)
    }
}
