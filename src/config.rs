//! Monitor configuration
//!
//! Loaded once at startup from a TOML file. Every field has a default, so an empty
//! (or missing) file yields a working property-store-only monitor.
//!
//! ```toml
//! name = "Living room"
//! show_humidity_tile = false
//! enable_history = true
//! history_storage_path = "/var/lib/pms_monitor"
//! enable_telemetry = true
//!
//! [mqtt]
//! url = "mqtt://broker.local:1883"
//!
//! [mqtt.topics]
//! pm2_5 = "home/livingroom/pm2.5"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::sinks::telemetry::Topic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Display name of the accessory; also names the history file.
    pub name: String,

    /// Expose PM10 on a temperature tile.
    pub show_temperature_tile: bool,

    /// Expose the 0.3 µm bucket on a humidity tile.
    pub show_humidity_tile: bool,

    pub enable_history: bool,
    pub history_storage_path: Option<PathBuf>,

    pub enable_telemetry: bool,
    pub mqtt: Option<MqttConfig>,

    /// Scheduler tick period.
    pub poll_interval_ms: u64,

    /// Upper bound for one blocking sensor read.
    pub read_timeout_ms: u32,

    /// Append a run summary row here on shutdown.
    pub summary_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: "PMS7003".to_string(),
            show_temperature_tile: true,
            show_humidity_tile: true,
            enable_history: false,
            history_storage_path: None,
            enable_telemetry: false,
            mqtt: None,
            poll_interval_ms: 1000,
            read_timeout_ms: 1000,
            summary_path: None,
        }
    }
}

/// Broker address and per-metric topic overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub url: Option<String>,
    pub topics: TopicOverrides,
}

/// Any topic left unset falls back to its `PMS7003/...` default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicOverrides {
    pub pm1_0_standard: Option<String>,
    pub pm2_5_standard: Option<String>,
    pub pm10_standard: Option<String>,
    pub pm1_0: Option<String>,
    pub pm2_5: Option<String>,
    pub pm10: Option<String>,
    pub bucket0_3: Option<String>,
    pub bucket0_5: Option<String>,
    pub bucket1_0: Option<String>,
    pub bucket2_5: Option<String>,
    pub bucket5_0: Option<String>,
    pub bucket10: Option<String>,
}

impl TopicOverrides {
    pub fn get(&self, topic: Topic) -> Option<&str> {
        let v = match topic {
            Topic::Pm1_0Standard => &self.pm1_0_standard,
            Topic::Pm2_5Standard => &self.pm2_5_standard,
            Topic::Pm10Standard => &self.pm10_standard,
            Topic::Pm1_0 => &self.pm1_0,
            Topic::Pm2_5 => &self.pm2_5,
            Topic::Pm10 => &self.pm10,
            Topic::Bucket0_3 => &self.bucket0_3,
            Topic::Bucket0_5 => &self.bucket0_5,
            Topic::Bucket1_0 => &self.bucket1_0,
            Topic::Bucket2_5 => &self.bucket2_5,
            Topic::Bucket5_0 => &self.bucket5_0,
            Topic::Bucket10 => &self.bucket10,
        };
        v.as_deref()
    }
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Missing file means defaults; an unreadable or malformed file is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("[Config] {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
