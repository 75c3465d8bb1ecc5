//! Aggregator: validate raw readings, feed per-channel windows, emit metric updates.
//!
//! Pipeline: raw reading → range check → channel window → (PM2.5) classification → `MetricUpdate`.
//! Rejected samples never touch the window or its emission counter.

use std::{fmt, time::SystemTime};

use log::{debug, info, warn};

use crate::acquisition::{
    classifier::{classify, AirQuality},
    sensor::Reading,
    window::ChannelWindow,
};
use crate::error::ValidationError;

/// Full scale of the 0.3 µm bucket when presented as a percentage.
pub const BUCKET_FULL_SCALE: f64 = 10_000.0;

/// Smoothed channels tracked by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pm25,
    Pm10,
    Particles03,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Pm25, Channel::Pm10, Channel::Particles03];

    /// Accepted physical range, inclusive on both ends.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Channel::Pm25 => (0.0, 1000.0),
            Channel::Pm10 => (0.0, 1000.0),
            Channel::Particles03 => (0.0, BUCKET_FULL_SCALE),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Pm25 => "PM2.5",
            Channel::Pm10 => "PM10",
            Channel::Particles03 => "0.3-0.5µm bucket",
        }
    }

    fn index(&self) -> usize {
        match self {
            Channel::Pm25 => 0,
            Channel::Pm10 => 1,
            Channel::Particles03 => 2,
        }
    }

    /// Range check; NaN is rejected as well.
    pub fn validate(&self, value: f64) -> Result<f64, ValidationError> {
        let (min, max) = self.bounds();
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError {
                channel: *self,
                value,
                min,
                max,
            })
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rescale a smoothed 0.3 µm bucket count to 0–100 %.
pub fn bucket_percentage(smoothed: f64) -> f64 {
    smoothed / BUCKET_FULL_SCALE * 100.0
}

/// One completed smoothing cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricUpdate {
    pub channel: Channel,
    pub value: f64,
    pub category: Option<AirQuality>,
    pub timestamp: SystemTime,
}

impl MetricUpdate {
    /// Timestamp as whole seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> u64 {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Owns one window per tracked channel. Mutated only through `ingest*`.
#[derive(Debug, Default)]
pub struct Aggregator {
    windows: [ChannelWindow; 3],
    rejected: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll's reading; returns an update for every channel that completed
    /// its cycle on this poll (0..=3).
    pub fn ingest(&mut self, reading: &Reading) -> Vec<MetricUpdate> {
        debug!(
            "[Aggregator] read: PM2.5={}µg/m3 PM10={}µg/m3 B0.3={}",
            reading.pm2_5, reading.pm10, reading.bucket0_3
        );

        let now = SystemTime::now();
        [
            (Channel::Pm25, reading.pm2_5),
            (Channel::Pm10, reading.pm10),
            (Channel::Particles03, reading.bucket0_3),
        ]
        .into_iter()
        .filter_map(|(channel, raw)| self.ingest_at(channel, f64::from(raw), now))
        .collect()
    }

    /// Feed a single channel sample.
    pub fn ingest_sample(&mut self, channel: Channel, value: f64) -> Option<MetricUpdate> {
        self.ingest_at(channel, value, SystemTime::now())
    }

    fn ingest_at(&mut self, channel: Channel, value: f64, now: SystemTime) -> Option<MetricUpdate> {
        if let Err(e) = channel.validate(value) {
            self.rejected += 1;
            warn!(
                "[Aggregator] {} (current: {})",
                e,
                fmt_current(self.current(channel))
            );
            return None;
        }

        let smoothed = self.windows[channel.index()].ingest(value)?;
        let category = (channel == Channel::Pm25).then(|| classify(smoothed));
        match category {
            Some(q) => info!("[Aggregator] {}: {} ({})", channel, smoothed, q),
            None => info!("[Aggregator] {}: {}", channel, smoothed),
        }

        Some(MetricUpdate {
            channel,
            value: smoothed,
            category,
            timestamp: now,
        })
    }

    /// Last emitted smoothed value for `channel`.
    pub fn current(&self, channel: Channel) -> Option<f64> {
        self.windows[channel.index()].last()
    }

    pub fn window(&self, channel: Channel) -> &ChannelWindow {
        &self.windows[channel.index()]
    }

    /// Samples rejected by the range check since start.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

fn fmt_current(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pm2_5: u16, pm10: u16, bucket0_3: u16) -> Reading {
        Reading {
            pm2_5,
            pm10,
            bucket0_3,
            ..Reading::default()
        }
    }

    #[test]
    fn thirty_pm25_of_twenty_is_one_good_update() {
        let mut agg = Aggregator::new();
        let mut updates = Vec::new();
        for _ in 0..30 {
            updates.extend(agg.ingest_sample(Channel::Pm25, 20.0));
        }
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].channel, Channel::Pm25);
        assert_eq!(updates[0].value, 20.0);
        assert_eq!(updates[0].category, Some(AirQuality::Good));
        assert_eq!(agg.current(Channel::Pm25), Some(20.0));
    }

    #[test]
    fn out_of_range_never_touches_window() {
        let mut agg = Aggregator::new();
        for _ in 0..30 {
            assert!(agg.ingest_sample(Channel::Pm25, 1500.0).is_none());
        }
        let w = agg.window(Channel::Pm25);
        assert!(w.is_empty());
        assert_eq!(w.pending(), 0);
        assert_eq!(agg.rejected(), 30);
    }

    #[test]
    fn negative_and_nan_are_rejected() {
        let mut agg = Aggregator::new();
        assert!(agg.ingest_sample(Channel::Pm10, -1.0).is_none());
        assert!(agg.ingest_sample(Channel::Particles03, f64::NAN).is_none());
        assert_eq!(agg.rejected(), 2);
        assert!(agg.window(Channel::Pm10).is_empty());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(Channel::Pm25.validate(1000.0).is_ok());
        assert!(Channel::Pm25.validate(1000.5).is_err());
        assert!(Channel::Particles03.validate(10_000.0).is_ok());
        assert!(Channel::Particles03.validate(10_001.0).is_err());
        assert!(Channel::Pm10.validate(0.0).is_ok());
    }

    #[test]
    fn rejected_sample_excluded_from_later_mean() {
        let mut agg = Aggregator::new();
        let mut last = None;
        for i in 0..31 {
            let v = if i == 10 { 5000.0 } else { 40.0 };
            if let Some(u) = agg.ingest_sample(Channel::Pm10, v) {
                last = Some(u);
            }
        }
        let u = last.expect("one emission after 30 accepted samples");
        assert_eq!(u.value, 40.0);
        assert_eq!(u.category, None);
    }

    #[test]
    fn full_reading_emits_all_three_channels_together() {
        let mut agg = Aggregator::new();
        let mut updates = Vec::new();
        for _ in 0..30 {
            updates.extend(agg.ingest(&reading(10, 20, 5000)));
        }
        let channels: Vec<Channel> = updates.iter().map(|u| u.channel).collect();
        assert_eq!(channels, Channel::ALL.to_vec());
        assert_eq!(updates[2].value, 5000.0);
        assert_eq!(bucket_percentage(updates[2].value), 50.0);
    }

    #[test]
    fn channels_count_independently() {
        let mut agg = Aggregator::new();
        // PM2.5 out of range on every poll; PM10 still emits on its own cadence.
        let mut updates = Vec::new();
        for _ in 0..30 {
            updates.extend(agg.ingest(&reading(2000, 50, 100)));
        }
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.channel != Channel::Pm25));
        assert_eq!(agg.current(Channel::Pm25), None);
    }
}
