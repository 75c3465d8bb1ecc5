//! scheduler.rs
//! Drives the pipeline on a fixed wall-clock tick.
//! - Setup (`SensorPort::init`) once; a failure is logged and polling continues
//! - One immediate poll, then one poll per period against absolute deadlines
//! - A late tick is logged and polled at once; later deadlines realign, never bunch
//! - Stopping clears the running flag; the current poll always completes

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::acquisition::{Aggregator, MetricUpdate, SensorPort};
use crate::config::MonitorConfig;
use crate::error::SensorError;
use crate::sinks::{SinkKind, SinkRouter};
use crate::utils::metrics::PipelineStats;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_READ_TIMEOUT_MS: u32 = 1000;

/// Native sleep accuracy handed to the spin sleeper (ns).
const SLEEP_ACCURACY_NS: u32 = 100_000;

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Reading accepted by the pipeline; zero or more channels completed a cycle.
    Read(Vec<MetricUpdate>),
    /// Sensor read failed; properties were marked unavailable.
    Failed(SensorError),
}

pub struct Scheduler<S: SensorPort> {
    sensor: S,
    aggregator: Aggregator,
    router: SinkRouter,
    period: Duration,
    read_timeout_ms: u32,
    running: Arc<AtomicBool>,
    polls: u64,
    read_failures: u64,
    updates: u64,
}

impl<S: SensorPort> Scheduler<S> {
    pub fn new(sensor: S, router: SinkRouter) -> Self {
        Self {
            sensor,
            aggregator: Aggregator::new(),
            router,
            period: DEFAULT_PERIOD,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            running: Arc::new(AtomicBool::new(true)),
            polls: 0,
            read_failures: 0,
            updates: 0,
        }
    }

    pub fn from_config(sensor: S, router: SinkRouter, config: &MonitorConfig) -> Self {
        Self::new(sensor, router)
            .with_period(config.poll_interval())
            .with_read_timeout(config.read_timeout_ms)
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_read_timeout(mut self, timeout_ms: u32) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Shared flag; storing `false` stops the loop before its next tick.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn router(&self) -> &SinkRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut SinkRouter {
        &mut self.router
    }

    /// Open the sensor. Failures are expected to be transient, so they only log.
    pub fn setup(&mut self) {
        match self.sensor.init() {
            Ok(()) => info!("[Scheduler] sensor initialised"),
            Err(e) => error!("[Scheduler] sensor setup failed, polling anyway: {}", e),
        }
    }

    /// One poll cycle: read, then aggregate and fan out, or mark properties unavailable.
    pub fn poll_once(&mut self) -> PollOutcome {
        self.polls += 1;
        match self.sensor.read(self.read_timeout_ms) {
            Err(e) => {
                self.read_failures += 1;
                error!("[Scheduler] read failed: {}", e);
                self.router.publish_unavailable(&e);
                PollOutcome::Failed(e)
            }
            Ok(reading) => {
                let updates = self.aggregator.ingest(&reading);
                for update in &updates {
                    self.router.publish(update);
                }
                self.updates += updates.len() as u64;
                self.router.publish_raw(&reading);
                PollOutcome::Read(updates)
            }
        }
    }

    /// Setup, one immediate poll, then a poll every period until stopped.
    pub fn run(&mut self) {
        info!(
            "[Scheduler] started period={:?} read_timeout={}ms",
            self.period, self.read_timeout_ms
        );
        self.setup();
        self.poll_once();

        let sleeper = SpinSleeper::new(SLEEP_ACCURACY_NS)
            .with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_deadline = Instant::now() + self.period;

        while self.is_running() {
            let now = Instant::now();
            if now < next_deadline {
                sleeper.sleep(next_deadline - now);
                next_deadline += self.period;
            } else {
                // Missed: poll now, then realign to the next future tick.
                warn!("[Scheduler] tick late by {:?}", now - next_deadline);
                while next_deadline <= now {
                    next_deadline += self.period;
                }
            }

            if !self.is_running() {
                break;
            }
            self.poll_once();
        }

        self.teardown();
    }

    /// Release the sensor once polling has stopped.
    pub fn teardown(&mut self) {
        self.sensor.deinit();
        info!("[Scheduler] stopped after {} polls", self.polls);
    }

    /// Counters for this run, including the router's per-sink counts.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            polls: self.polls,
            read_failures: self.read_failures,
            rejected_samples: self.aggregator.rejected(),
            updates: self.updates,
            properties: self.router.property_counters(),
            history: self.router.counters(SinkKind::History),
            telemetry: self.router.counters(SinkKind::Telemetry),
        }
    }

    /// Give the sensor back (for reuse or inspection after `run`).
    pub fn into_sensor(self) -> S {
        debug!("[Scheduler] releasing sensor handle");
        self.sensor
    }
}
