// Sinks: consumers of pipeline output.
// The router fans each metric update out to the property store (always), the history
// log and the telemetry broker (both optional). Every sink sits behind a capability
// trait so the pipeline never depends on a concrete store, file or client.

pub mod history;
pub mod property;
pub mod router;
pub mod telemetry;

use std::fmt;

use serde::Serialize;

use crate::error::SinkError;

pub use history::CsvHistory;
pub use property::{AccessoryInfo, PropertyState, PropertyStore};
pub use router::{SinkKind, SinkRouter};
pub use telemetry::{MqttTelemetry, Topic, TopicMap};

/// Properties exposed to the smart-home property store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyId {
    Pm25Density,
    Pm10Density,
    /// Air-quality category ordinal (1..=5).
    AirQuality,
    /// Custom air-quality index characteristic; carries the raw PM2.5 mean.
    AirQualityIndex,
    /// PM10 presented on a temperature tile.
    TemperatureTile,
    /// 0.3 µm bucket presented as a percentage on a humidity tile.
    HumidityTile,
}

impl PropertyId {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyId::Pm25Density => "PM2.5 Density",
            PropertyId::Pm10Density => "PM10 Density",
            PropertyId::AirQuality => "Air Quality",
            PropertyId::AirQualityIndex => "Air Quality Index",
            PropertyId::TemperatureTile => "PM10 (temperature tile)",
            PropertyId::HumidityTile => "0.3-0.5µm bucket (humidity tile)",
        }
    }

    /// Exposed properties for the given tile flags.
    pub fn exposed(show_temperature_tile: bool, show_humidity_tile: bool) -> Vec<PropertyId> {
        let mut ids = vec![
            PropertyId::Pm25Density,
            PropertyId::Pm10Density,
            PropertyId::AirQuality,
            PropertyId::AirQualityIndex,
        ];
        if show_temperature_tile {
            ids.push(PropertyId::TemperatureTile);
        }
        if show_humidity_tile {
            ids.push(PropertyId::HumidityTile);
        }
        ids
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Live property store capability.
#[cfg_attr(test, mockall::automock)]
pub trait PropertySink: Send {
    fn set_value(&mut self, id: PropertyId, value: f64) -> Result<(), SinkError>;

    /// Mark `id` as not responding; `reason` is the human-readable sensor error.
    fn set_unavailable(&mut self, id: PropertyId, reason: &str) -> Result<(), SinkError>;
}

/// One history record. Only the field matching the recorded metric is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Seconds since the Unix epoch.
    pub time: u64,
    pub ppm: Option<f64>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
}

/// Historical log capability.
#[cfg_attr(test, mockall::automock)]
pub trait HistorySink: Send {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError>;
}

/// Telemetry broker capability.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetryClient: Send {
    /// Connection status as last reported by the transport.
    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), SinkError>;
}
