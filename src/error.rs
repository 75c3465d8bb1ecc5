//! Error taxonomy for the monitor.
//!
//! - [`ValidationError`]: a raw sample outside its channel bounds. Discarded and logged.
//! - [`SensorError`]: device or driver failure. Surfaced to the property store as an
//!   unavailable state, never a crash.
//! - [`SinkError`]: delivery failure in one sink. Logged and isolated from the others.
//! - [`ConfigError`]: startup configuration could not be read or parsed.

use thiserror::Error;

use crate::acquisition::Channel;

/// Machine-readable failure codes reported by the sensor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorErrorCode {
    /// Device could not be found or opened.
    Device,
    /// Invalid argument passed to the driver.
    InvalidArgument,
    /// UART / event loop failed to deliver data.
    Driver,
    /// Nothing arrived within the read timeout.
    Timeout,
    /// Framing or length error in the received frame.
    Data,
    /// Frame checksum mismatch.
    Checksum,
}

impl SensorErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorErrorCode::Device => "device",
            SensorErrorCode::InvalidArgument => "invalid_argument",
            SensorErrorCode::Driver => "driver",
            SensorErrorCode::Timeout => "timeout",
            SensorErrorCode::Data => "data",
            SensorErrorCode::Checksum => "checksum",
        }
    }
}

/// Failure reported by a [`SensorPort`](crate::acquisition::SensorPort).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("sensor {} error: {message}", code.as_str())]
pub struct SensorError {
    pub code: SensorErrorCode,
    pub message: String,
}

impl SensorError {
    pub fn new(code: SensorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u32) -> Self {
        Self::new(
            SensorErrorCode::Timeout,
            format!("nothing received from sensor within {} ms", timeout_ms),
        )
    }
}

/// A raw sample rejected by the aggregator's range check.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{channel} reading out of range: {value} not in [{min}, {max}]")]
pub struct ValidationError {
    pub channel: Channel,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Delivery failure in one output sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink's transport is not connected.
    #[error("{sink} not connected")]
    Disconnected { sink: &'static str },

    /// The sink accepted the call but could not deliver it.
    #[error("{sink} delivery failed: {message}")]
    Delivery { sink: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result alias for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
