//! Alerting Engine
//!
//! Classifies incoming sensor readings per device, applies cooldown and
//! spike-override policy, detects devices that stopped reporting, and
//! publishes the resulting events to an [`EventSink`].

mod config;
mod device;
mod error;
mod event;
mod manager;

pub use config::{ChannelConfig, ConfigProvider, RuntimeConfig, SharedConfig, StaticConfig, Thresholds};
pub use device::{classify, CooldownBucket, CooldownLedger, DeviceSnapshot, DeviceState, DeviceStatus};
pub use error::AlertingError;
pub use event::{AlertEvent, Bounds, EventKind};
pub use manager::{AlertManager, EventSink, Reading};
