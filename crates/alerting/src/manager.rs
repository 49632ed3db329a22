//! Alert Manager Implementation

use crate::config::{ConfigProvider, Thresholds};
use crate::device::{DeviceSnapshot, DeviceState};
use crate::error::AlertingError;
use crate::event::{AlertEvent, Bounds};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Receiver of the events produced by the manager.
///
/// Delivery failures stay inside the sink; publishing never fails from the
/// manager's point of view.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &AlertEvent);
}

/// A validated sample handed over by the ingest path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64,
    #[serde(default)]
    pub fault_code: u32,
    /// Receipt time on the server clock; drives cooldowns and staleness
    pub timestamp_ms: i64,
    #[serde(default)]
    pub lower_bound: Option<f64>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, temperature: f64, fault_code: u32, timestamp_ms: i64) -> Self {
        Self {
            device_id: device_id.into(),
            temperature,
            fault_code,
            timestamp_ms,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }
}

/// One device's state plus the lane that orders its deliveries
struct DeviceSlot {
    /// Held across dispatch so a device's events leave in processing order
    lane: tokio::sync::Mutex<()>,
    /// Classification and cooldown test-and-set happen under this lock
    state: Mutex<DeviceState>,
}

impl DeviceSlot {
    fn new(id: &str) -> Self {
        Self {
            lane: tokio::sync::Mutex::new(()),
            state: Mutex::new(DeviceState::new(id)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns every device's state machine and forwards their events to a sink
pub struct AlertManager {
    /// Timing policy
    thresholds: Thresholds,
    /// Runtime configuration (default bounds)
    config: Arc<dyn ConfigProvider>,
    /// Where events go
    sink: RwLock<Arc<dyn EventSink>>,
    /// Device states by id
    devices: RwLock<HashMap<String, Arc<DeviceSlot>>>,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(
        thresholds: Thresholds,
        config: Arc<dyn ConfigProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, AlertingError> {
        thresholds.validate()?;
        info!("Creating alert manager with thresholds: {:?}", thresholds);
        Ok(Self {
            thresholds,
            config,
            sink: RwLock::new(sink),
            devices: RwLock::new(HashMap::new()),
        })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Replace the event sink without touching device state
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Classify a reading for its device and publish the resulting events
    pub async fn update_reading(&self, reading: Reading) -> Vec<AlertEvent> {
        let bounds = Bounds::resolve(
            reading.lower_bound,
            reading.upper_bound,
            self.config.current().default_bounds,
        );
        let slot = self.slot(&reading.device_id);

        let _lane = slot.lane.lock().await;
        let events = slot.state().on_reading(
            reading.temperature,
            reading.fault_code,
            bounds,
            reading.timestamp_ms,
            &self.thresholds,
        );

        debug!(
            device = %reading.device_id,
            temperature = reading.temperature,
            fault_code = reading.fault_code,
            events = events.len(),
            "Reading processed"
        );

        self.publish(&events).await;
        events
    }

    /// Sweep all devices for staleness and publish `offline` events
    pub async fn check_heartbeats(&self, now_ms: i64) -> Vec<AlertEvent> {
        let offline_after = self.thresholds.offline_after_ms();
        let cooldown = self.thresholds.cooldown_ms();
        let slots: Vec<Arc<DeviceSlot>> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut emitted = Vec::new();
        for slot in slots {
            let _lane = slot.lane.lock().await;
            let event = slot.state().on_heartbeat(now_ms, offline_after, cooldown);
            if let Some(event) = event {
                self.publish(std::slice::from_ref(&event)).await;
                emitted.push(event);
            }
        }

        if !emitted.is_empty() {
            info!(offline = emitted.len(), "Heartbeat sweep found silent devices");
        }
        emitted
    }

    /// Snapshot of every known device, sorted by id
    pub fn get_states(&self) -> Vec<DeviceSnapshot> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = devices.values().map(|slot| slot.state().snapshot()).collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    /// Snapshot of one device
    pub fn get_state(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .map(|slot| slot.state().snapshot())
    }

    /// Forget a device; returns whether it was known
    pub fn evict(&self, device_id: &str) -> bool {
        let removed = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id)
            .is_some();
        if removed {
            info!(device = device_id, "Device evicted");
        }
        removed
    }

    /// Number of tracked devices
    pub fn device_count(&self) -> usize {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn slot(&self, device_id: &str) -> Arc<DeviceSlot> {
        if let Some(slot) = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
        {
            return slot.clone();
        }

        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                info!(device = device_id, "Tracking new device");
                Arc::new(DeviceSlot::new(device_id))
            })
            .clone()
    }

    async fn publish(&self, events: &[AlertEvent]) {
        if events.is_empty() {
            return;
        }
        let sink = self.sink.read().unwrap_or_else(PoisonError::into_inner).clone();
        for event in events {
            sink.publish(event).await;
        }
    }
}
