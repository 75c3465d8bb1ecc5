//! router.rs
//! Fan-out of pipeline output to the property store, history log and telemetry broker.
//! - Active sinks are decided once at construction; callers never branch on enablement
//! - A failing sink is logged and counted; delivery to the other sinks continues
//! - Secondary raw channels go to telemetry once every 30 successful polls, on a counter
//!   independent of the smoothing cadence and of telemetry enablement

use log::{debug, error, info, warn};

use crate::acquisition::{bucket_percentage, Channel, MetricUpdate, Reading};
use crate::config::MonitorConfig;
use crate::error::{SensorError, SinkError};
use crate::sinks::{
    history::CsvHistory,
    telemetry::{MqttTelemetry, Topic, TopicMap},
    HistoryEntry, HistorySink, PropertyId, PropertySink, TelemetryClient,
};
use crate::utils::metrics::SinkCounters;

/// Successful polls between two secondary-channel telemetry rounds.
pub const SECONDARY_EVERY: u32 = 30;

/// Added to PM2.5 before it is recorded in history; the history viewer graphs `ppm`
/// with a 450 floor.
pub const HISTORY_PPM_OFFSET: f64 = 450.0;

/// Optional sinks that can be toggled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    History,
    Telemetry,
}

struct Route<T> {
    sink: T,
    enabled: bool,
    counters: SinkCounters,
}

impl<T> Route<T> {
    fn new(sink: T, enabled: bool) -> Self {
        Self {
            sink,
            enabled,
            counters: SinkCounters::default(),
        }
    }
}

struct TelemetryRoute {
    client: Box<dyn TelemetryClient>,
    topics: TopicMap,
}

pub struct SinkRouter {
    properties: Box<dyn PropertySink>,
    exposed: Vec<PropertyId>,
    property_counters: SinkCounters,
    history: Option<Route<Box<dyn HistorySink>>>,
    telemetry: Option<Route<TelemetryRoute>>,
    polls_since_secondary: u32,
}

impl SinkRouter {
    /// Router with only the property sink attached.
    pub fn new(properties: Box<dyn PropertySink>, exposed: Vec<PropertyId>) -> Self {
        Self {
            properties,
            exposed,
            property_counters: SinkCounters::default(),
            history: None,
            telemetry: None,
            polls_since_secondary: 0,
        }
    }

    pub fn with_history(mut self, sink: Box<dyn HistorySink>, enabled: bool) -> Self {
        self.history = Some(Route::new(sink, enabled));
        self
    }

    pub fn with_telemetry(
        mut self,
        client: Box<dyn TelemetryClient>,
        topics: TopicMap,
        enabled: bool,
    ) -> Self {
        self.telemetry = Some(Route::new(TelemetryRoute { client, topics }, enabled));
        self
    }

    /// Build the optional sinks from configuration. Missing addressing disables the
    /// sink and is reported here, once.
    pub fn from_config(
        config: &MonitorConfig,
        properties: Box<dyn PropertySink>,
        client_id: &str,
    ) -> Self {
        let exposed =
            PropertyId::exposed(config.show_temperature_tile, config.show_humidity_tile);
        let mut router = Self::new(properties, exposed);

        if !config.enable_history {
            info!("[Router] history not enabled");
        } else {
            match &config.history_storage_path {
                None => warn!("[Router] history enabled but no storage path configured; history disabled"),
                Some(dir) => match CsvHistory::open(dir, &config.name) {
                    Ok(history) => router = router.with_history(Box::new(history), true),
                    Err(e) => error!("[Router] failed to open history in {:?}: {}", dir, e),
                },
            }
        }

        if !config.enable_telemetry {
            info!("[Router] telemetry not enabled");
        } else {
            match config.mqtt.as_ref() {
                None => error!("[Router] telemetry enabled but no [mqtt] config found; telemetry disabled"),
                Some(mqtt) => match mqtt.url.as_deref() {
                    None => error!("[Router] [mqtt] has no url; telemetry disabled"),
                    Some(url) => match MqttTelemetry::connect(url, client_id) {
                        Ok(client) => {
                            let topics = TopicMap::resolve(&mqtt.topics);
                            router = router.with_telemetry(Box::new(client), topics, true);
                        }
                        Err(e) => error!("[Router] failed to set up telemetry for {}: {}", url, e),
                    },
                },
            }
        }

        router
    }

    /// Toggle an optional sink. Returns false if the sink was never attached.
    pub fn set_enabled(&mut self, kind: SinkKind, enabled: bool) -> bool {
        let slot = match kind {
            SinkKind::History => self.history.as_mut().map(|r| &mut r.enabled),
            SinkKind::Telemetry => self.telemetry.as_mut().map(|r| &mut r.enabled),
        };
        match slot {
            Some(flag) => {
                *flag = enabled;
                info!("[Router] {:?} {}", kind, if enabled { "enabled" } else { "disabled" });
                true
            }
            None => {
                warn!("[Router] {:?} is not attached; ignoring toggle", kind);
                false
            }
        }
    }

    /// Attached and enabled.
    pub fn is_active(&self, kind: SinkKind) -> bool {
        match kind {
            SinkKind::History => self.history.as_ref().is_some_and(|r| r.enabled),
            SinkKind::Telemetry => self.telemetry.as_ref().is_some_and(|r| r.enabled),
        }
    }

    pub fn exposed(&self) -> &[PropertyId] {
        &self.exposed
    }

    pub fn property_counters(&self) -> SinkCounters {
        self.property_counters
    }

    pub fn counters(&self, kind: SinkKind) -> SinkCounters {
        match kind {
            SinkKind::History => self.history.as_ref().map(|r| r.counters),
            SinkKind::Telemetry => self.telemetry.as_ref().map(|r| r.counters),
        }
        .unwrap_or_default()
    }

    /// Deliver one completed smoothing cycle to every active sink.
    pub fn publish(&mut self, update: &MetricUpdate) {
        self.publish_properties(update);
        self.publish_history(update);
        self.publish_telemetry(update);
    }

    /// Per-poll bookkeeping for the secondary raw channels.
    pub fn publish_raw(&mut self, reading: &Reading) {
        self.polls_since_secondary += 1;
        if self.polls_since_secondary < SECONDARY_EVERY {
            return;
        }
        self.polls_since_secondary = 0;

        let Some(route) = self.telemetry.as_mut().filter(|r| r.enabled) else {
            return;
        };
        for topic in Topic::SECONDARY {
            let value = topic.raw_value(reading).to_string();
            send(route, topic, &value);
        }
    }

    /// Sensor failure: every exposed property goes to the unavailable state.
    pub fn publish_unavailable(&mut self, err: &SensorError) {
        for id in &self.exposed {
            let result = self.properties.set_unavailable(*id, &err.message);
            record(&mut self.property_counters, "properties", result);
        }
    }

    /// Polls counted towards the next secondary round.
    pub fn secondary_pending(&self) -> u32 {
        self.polls_since_secondary
    }

    fn publish_properties(&mut self, update: &MetricUpdate) {
        for (id, value) in property_values(update) {
            if !self.exposed.contains(&id) {
                continue;
            }
            let result = self.properties.set_value(id, value);
            record(&mut self.property_counters, "properties", result);
        }
    }

    fn publish_history(&mut self, update: &MetricUpdate) {
        let Some(route) = self.history.as_mut().filter(|r| r.enabled) else {
            return;
        };
        let result = route.sink.add_entry(&history_entry(update));
        record(&mut route.counters, "history", result);
    }

    fn publish_telemetry(&mut self, update: &MetricUpdate) {
        let Some(route) = self.telemetry.as_mut().filter(|r| r.enabled) else {
            return;
        };
        send(route, Topic::for_channel(update.channel), &update.value.to_string());
    }
}

fn send(route: &mut Route<TelemetryRoute>, topic: Topic, payload: &str) {
    let Some(name) = route.sink.topics.get(topic) else {
        route.counters.skipped += 1;
        return;
    };
    if !route.sink.client.is_connected() {
        warn!("[Router] telemetry not connected; dropping {} = {}", name, payload);
        route.counters.skipped += 1;
        return;
    }
    debug!("[Router] telemetry {} = {}", name, payload);
    let result = route.sink.client.publish(name, payload);
    record(&mut route.counters, "telemetry", result);
}

fn record(counters: &mut SinkCounters, sink: &str, result: Result<(), SinkError>) {
    if let Err(e) = &result {
        error!("[Router] {} sink failed: {}", sink, e);
    }
    counters.record(result.is_ok());
}

/// Property writes for one update.
fn property_values(update: &MetricUpdate) -> Vec<(PropertyId, f64)> {
    let v = update.value;
    match update.channel {
        Channel::Pm25 => {
            let mut values = vec![
                (PropertyId::Pm25Density, v),
                (PropertyId::AirQualityIndex, v),
            ];
            if let Some(q) = update.category {
                values.push((PropertyId::AirQuality, f64::from(q.ordinal())));
            }
            values
        }
        Channel::Pm10 => vec![
            (PropertyId::Pm10Density, v),
            (PropertyId::TemperatureTile, v),
        ],
        Channel::Particles03 => vec![(PropertyId::HumidityTile, bucket_percentage(v))],
    }
}

/// History record for one update.
pub fn history_entry(update: &MetricUpdate) -> HistoryEntry {
    let mut entry = HistoryEntry {
        time: update.unix_seconds(),
        ..HistoryEntry::default()
    };
    match update.channel {
        Channel::Pm25 => entry.ppm = Some(update.value + HISTORY_PPM_OFFSET),
        Channel::Pm10 => entry.temp = Some(update.value),
        Channel::Particles03 => entry.humidity = Some(bucket_percentage(update.value)),
    }
    entry
}
