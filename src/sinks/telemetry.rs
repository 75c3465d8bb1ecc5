//! telemetry.rs
//! Telemetry broker output: topic table and the MQTT client.
//! - Twelve topics: three smoothed primaries plus nine secondary raw channels
//! - Connection status arrives asynchronously on a background thread; it only logs
//!   and flips `connected`, never touches pipeline state
//! - Publishes are fire-and-forget (`try_publish`, QoS 0)

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use crate::acquisition::{Channel, Reading};
use crate::config::TopicOverrides;
use crate::error::SinkError;
use crate::sinks::TelemetryClient;

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Pm1_0Standard,
    Pm2_5Standard,
    Pm10Standard,
    Pm1_0,
    Pm2_5,
    Pm10,
    Bucket0_3,
    Bucket0_5,
    Bucket1_0,
    Bucket2_5,
    Bucket5_0,
    Bucket10,
}

impl Topic {
    pub const ALL: [Topic; 12] = [
        Topic::Pm1_0Standard,
        Topic::Pm2_5Standard,
        Topic::Pm10Standard,
        Topic::Pm1_0,
        Topic::Pm2_5,
        Topic::Pm10,
        Topic::Bucket0_3,
        Topic::Bucket0_5,
        Topic::Bucket1_0,
        Topic::Bucket2_5,
        Topic::Bucket5_0,
        Topic::Bucket10,
    ];

    /// Raw channels republished periodically, unsmoothed.
    pub const SECONDARY: [Topic; 9] = [
        Topic::Pm1_0Standard,
        Topic::Pm2_5Standard,
        Topic::Pm10Standard,
        Topic::Pm1_0,
        Topic::Bucket0_5,
        Topic::Bucket1_0,
        Topic::Bucket2_5,
        Topic::Bucket5_0,
        Topic::Bucket10,
    ];

    pub fn default_topic(&self) -> &'static str {
        match self {
            Topic::Pm1_0Standard => "PMS7003/PM1.0 Standard",
            Topic::Pm2_5Standard => "PMS7003/PM2.5 Standard",
            Topic::Pm10Standard => "PMS7003/PM10 Standard",
            Topic::Pm1_0 => "PMS7003/PM1.0",
            Topic::Pm2_5 => "PMS7003/PM2.5",
            Topic::Pm10 => "PMS7003/PM10",
            Topic::Bucket0_3 => "PMS7003/0.3",
            Topic::Bucket0_5 => "PMS7003/0.5",
            Topic::Bucket1_0 => "PMS7003/1.0",
            Topic::Bucket2_5 => "PMS7003/2.5",
            Topic::Bucket5_0 => "PMS7003/5.0",
            Topic::Bucket10 => "PMS7003/10",
        }
    }

    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Pm25 => Topic::Pm2_5,
            Channel::Pm10 => Topic::Pm10,
            Channel::Particles03 => Topic::Bucket0_3,
        }
    }

    /// Raw value of this topic's channel in `reading`.
    pub fn raw_value(&self, reading: &Reading) -> u16 {
        match self {
            Topic::Pm1_0Standard => reading.pm1_0_s,
            Topic::Pm2_5Standard => reading.pm2_5_s,
            Topic::Pm10Standard => reading.pm10_s,
            Topic::Pm1_0 => reading.pm1_0,
            Topic::Pm2_5 => reading.pm2_5,
            Topic::Pm10 => reading.pm10,
            Topic::Bucket0_3 => reading.bucket0_3,
            Topic::Bucket0_5 => reading.bucket0_5,
            Topic::Bucket1_0 => reading.bucket1_0,
            Topic::Bucket2_5 => reading.bucket2_5,
            Topic::Bucket5_0 => reading.bucket5_0,
            Topic::Bucket10 => reading.bucket10,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Resolved topic names. `None` means the topic was configured blank and is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    names: [Option<String>; 12],
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            names: Topic::ALL.map(|t| Some(t.default_topic().to_string())),
        }
    }
}

impl TopicMap {
    /// Apply overrides on top of the defaults. Blank overrides disable their topic
    /// and are reported here, once.
    pub fn resolve(overrides: &TopicOverrides) -> Self {
        let names = Topic::ALL.map(|t| match overrides.get(t) {
            Some(name) if name.trim().is_empty() => {
                warn!("[Telemetry] blank topic for {:?}; it will not be published", t);
                None
            }
            Some(name) => Some(name.to_string()),
            None => Some(t.default_topic().to_string()),
        });
        Self { names }
    }

    pub fn get(&self, topic: Topic) -> Option<&str> {
        self.names[topic.index()].as_deref()
    }
}

/// Split `mqtt://host:port` (or `tcp://`, or a bare `host[:port]`) into host and port.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), SinkError> {
    let invalid = |message: String| SinkError::Delivery {
        sink: "telemetry",
        message,
    };

    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    if rest.contains("://") {
        return Err(invalid(format!("unsupported broker scheme in {:?}", url)));
    }
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| invalid(format!("invalid broker port in {:?}", url)))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(invalid(format!("missing broker host in {:?}", url)));
    }
    Ok((host.to_string(), port))
}

/// MQTT broker client with a background connection thread.
pub struct MqttTelemetry {
    url: String,
    client: Client,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MqttTelemetry {
    pub fn connect(url: &str, client_id: &str) -> Result<Self, SinkError> {
        let (host, port) = parse_broker_url(url)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, connection) = Client::new(options, REQUEST_QUEUE);
        let connected = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let handle = thread::Builder::new()
            .name("mqtt-connection".to_string())
            .spawn({
                let url = url.to_string();
                let connected = connected.clone();
                let running = running.clone();
                move || drive_connection(connection, url, connected, running)
            })?;

        info!("[Telemetry] connecting to {}", url);
        Ok(Self {
            url: url.to_string(),
            client,
            connected,
            running,
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Connection event loop. Logs and updates the status flag only.
fn drive_connection(
    mut connection: Connection,
    url: String,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) {
    for notification in connection.iter() {
        if !running.load(Ordering::Acquire) {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Release);
                info!("[Telemetry] client connected to {}", url);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                warn!("[Telemetry] broker closed the connection");
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Release);
                error!("[Telemetry] client error: {}", e);
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
    debug!("[Telemetry] connection loop stopped");
}

impl TelemetryClient for MqttTelemetry {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), SinkError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map_err(|e| SinkError::Delivery {
                sink: "telemetry",
                message: e.to_string(),
            })
    }
}

impl Drop for MqttTelemetry {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.client.try_disconnect() {
            debug!("[Telemetry] disconnect failed: {}", e);
        }
        // The loop exits on its next notification; don't block shutdown on it.
        drop(self.handle.take());
    }
}
