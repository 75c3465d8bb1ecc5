//! # pms_monitor
//!
//! Particulate-matter monitor: polls a PMS7003-class sensor once per second, smooths
//! PM2.5, PM10 and the 0.3 µm particle bucket over 30-sample windows, classifies air
//! quality, and fans the results out to a live property store, a CSV history log and
//! an MQTT broker.
//!
//! ## Pipeline
//! Scheduler tick → `SensorPort::read` → `Aggregator::ingest` → `ChannelWindow`s →
//! `classify` (PM2.5) → `SinkRouter::publish`.
//!
//! ## Failure model
//! - Out-of-range samples are dropped and logged; they never reach a window.
//! - A failed read marks every exposed property unavailable and skips aggregation.
//! - A failing sink is logged and isolated; the others still receive the update.

pub mod acquisition;
pub mod advanced;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sinks;
pub mod utils;

pub use acquisition::{AirQuality, Aggregator, Channel, MetricUpdate, Reading, SensorPort};
pub use config::MonitorConfig;
pub use error::{SensorError, SensorErrorCode, SinkError};
pub use scheduler::{PollOutcome, Scheduler};
pub use sinks::{PropertyId, PropertyStore, SinkKind, SinkRouter};

/// Host name used for the accessory serial number and the MQTT client id.
pub fn hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "localhost".to_string())
}
