//! sensor.rs
//! Sensor boundary: the raw reading bundle, the port the scheduler polls, and a
//! simulated particulate sensor for running without hardware.
//! - One `Reading` per poll; consumed synchronously, never retained
//! - `SensorPort::read` may block inline up to its timeout

use rand::{random_bool, random_range};
use log::debug;

use crate::error::{SensorError, SensorErrorCode};

/// One poll's raw values as reported by the driver.
///
/// Densities are µg/m³; buckets are particle counts per 0.1 L of air.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reading {
    /// Standard-condition densities.
    pub pm1_0_s: u16,
    pub pm2_5_s: u16,
    pub pm10_s: u16,
    /// Atmospheric-condition densities.
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
    /// Particle buckets (> 0.3 µm, > 0.5 µm, ...).
    pub bucket0_3: u16,
    pub bucket0_5: u16,
    pub bucket1_0: u16,
    pub bucket2_5: u16,
    pub bucket5_0: u16,
    pub bucket10: u16,
}

/// Synchronous access to the particulate sensor driver.
pub trait SensorPort {
    /// Open and configure the device. Called once before the first poll.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Block for at most `timeout_ms` waiting for one reading.
    fn read(&mut self, timeout_ms: u32) -> Result<Reading, SensorError>;

    /// Release the device.
    fn deinit(&mut self);
}

impl<S: SensorPort + ?Sized> SensorPort for Box<S> {
    fn init(&mut self) -> Result<(), SensorError> {
        (**self).init()
    }

    fn read(&mut self, timeout_ms: u32) -> Result<Reading, SensorError> {
        (**self).read(timeout_ms)
    }

    fn deinit(&mut self) {
        (**self).deinit()
    }
}

/// Base level and noise band for one simulated channel. The band is never empty.
#[derive(Debug, Clone, Copy)]
pub struct ChannelProfile {
    base: f64,
    noise: (f64, f64),
}

impl ChannelProfile {
    /// Noise is drawn from `lo..hi`; an empty or non-finite band is rejected.
    pub fn new(base: f64, lo: f64, hi: f64) -> Result<Self, SensorError> {
        if !(base.is_finite() && lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(SensorError::new(
                SensorErrorCode::InvalidArgument,
                format!("invalid noise band {}..{} around {}", lo, hi, base),
            ));
        }
        Ok(Self { base, noise: (lo, hi) })
    }

    const fn preset(base: f64, lo: f64, hi: f64) -> Self {
        Self { base, noise: (lo, hi) }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn noise(&self) -> (f64, f64) {
        self.noise
    }

    fn sample(&self) -> u16 {
        let (lo, hi) = self.noise;
        let v = self.base + random_range(lo..hi);
        v.round().clamp(0.0, u16::MAX as f64) as u16
    }
}

/// Rand-driven stand-in for the PMS7003 driver.
pub struct SimulatedSensor {
    pub pm2_5: ChannelProfile,
    pub pm10: ChannelProfile,
    pub bucket0_3: ChannelProfile,
    /// Probability (0.0..=1.0) that a read times out.
    pub failure_rate: f64,
    initialised: bool,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            pm2_5: ChannelProfile::preset(12.0, -4.0, 4.0),
            pm10: ChannelProfile::preset(18.0, -5.0, 5.0),
            bucket0_3: ChannelProfile::preset(2400.0, -300.0, 300.0),
            failure_rate: 0.0,
            initialised: false,
        }
    }
}

impl SimulatedSensor {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            ..Self::default()
        }
    }
}

impl SensorPort for SimulatedSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        self.initialised = true;
        debug!("[SimulatedSensor] initialised (failure_rate={})", self.failure_rate);
        Ok(())
    }

    fn read(&mut self, timeout_ms: u32) -> Result<Reading, SensorError> {
        if !self.initialised {
            return Err(SensorError::new(
                SensorErrorCode::Device,
                "sensor read before init",
            ));
        }
        if self.failure_rate > 0.0 && random_bool(self.failure_rate) {
            return Err(SensorError::timeout(timeout_ms));
        }

        let pm2_5 = self.pm2_5.sample();
        let pm10 = self.pm10.sample().max(pm2_5);
        let bucket0_3 = self.bucket0_3.sample();

        // Secondary channels track the primaries loosely.
        Ok(Reading {
            pm1_0_s: two_thirds(pm2_5),
            pm2_5_s: pm2_5,
            pm10_s: pm10,
            pm1_0: two_thirds(pm2_5),
            pm2_5,
            pm10,
            bucket0_3,
            bucket0_5: bucket0_3 / 3,
            bucket1_0: bucket0_3 / 12,
            bucket2_5: bucket0_3 / 80,
            bucket5_0: bucket0_3 / 400,
            bucket10: bucket0_3 / 1200,
        })
    }

    fn deinit(&mut self) {
        self.initialised = false;
        debug!("[SimulatedSensor] released");
    }
}

fn two_thirds(v: u16) -> u16 {
    // Never exceeds `v`, so the narrowing is lossless.
    (u32::from(v) * 2 / 3) as u16
}
