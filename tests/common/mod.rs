//! Shared fakes for the integration tests

#![allow(dead_code)] // Not every test file uses every fake

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use pms_monitor::{
    acquisition::{Reading, SensorPort},
    error::{SensorError, SinkError},
    sinks::{HistoryEntry, HistorySink, TelemetryClient},
};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Reading with only the three tracked channels set.
pub fn reading(pm2_5: u16, pm10: u16, bucket0_3: u16) -> Reading {
    Reading {
        pm2_5,
        pm10,
        bucket0_3,
        ..Reading::default()
    }
}

/// Replays queued results; an empty queue times out.
#[derive(Default)]
pub struct ScriptedSensor {
    script: VecDeque<Result<Reading, SensorError>>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, result: Result<Reading, SensorError>) -> Self {
        self.script.push_back(result);
        self
    }

    pub fn repeat(mut self, reading: Reading, times: usize) -> Self {
        self.script.extend((0..times).map(|_| Ok(reading)));
        self
    }
}

impl SensorPort for ScriptedSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self, timeout_ms: u32) -> Result<Reading, SensorError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(SensorError::timeout(timeout_ms)))
    }

    fn deinit(&mut self) {}
}

/// History sink that keeps every entry behind a shared handle.
#[derive(Clone, Default)]
pub struct RecordingHistory {
    pub entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl HistorySink for RecordingHistory {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Telemetry client that records `(topic, payload)` pairs; can be told to fail.
#[derive(Clone)]
pub struct RecordingTelemetry {
    pub published: Arc<Mutex<Vec<(String, String)>>>,
    pub connected: Arc<Mutex<bool>>,
    pub fail: Arc<Mutex<bool>>,
}

impl Default for RecordingTelemetry {
    fn default() -> Self {
        Self {
            published: Arc::default(),
            connected: Arc::new(Mutex::new(true)),
            fail: Arc::default(),
        }
    }
}

impl RecordingTelemetry {
    pub fn topics(&self) -> Vec<String> {
        self.published.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn payload_for(&self, topic: &str) -> Option<String> {
        self.published
            .lock()
            .iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
    }
}

impl TelemetryClient for RecordingTelemetry {
    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), SinkError> {
        if *self.fail.lock() {
            return Err(SinkError::Delivery {
                sink: "telemetry",
                message: "broker refused".to_string(),
            });
        }
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
