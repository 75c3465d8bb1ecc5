//! Fixed-capacity sliding window with a running sum for one channel.
//!
//! Emission cadence is driven by the number of accepted samples, not by window
//! occupancy: the first mean is produced after 30 samples even though the divisor is
//! always the full capacity. Downstream consumers rely on a strict 30-poll cadence
//! from startup.

use std::collections::VecDeque;

/// Samples retained per channel.
pub const WINDOW_CAPACITY: usize = 30;

/// Accepted samples between two emitted means.
pub const EMIT_EVERY: u32 = 30;

#[derive(Debug, Clone)]
pub struct ChannelWindow {
    samples: VecDeque<f64>,
    running_sum: f64,
    counter: u32,
    last: Option<f64>,
}

impl Default for ChannelWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_CAPACITY),
            running_sum: 0.0,
            counter: 0,
            last: None,
        }
    }

    /// Push one pre-validated sample; returns the smoothed value when this sample
    /// completes an emission cycle.
    pub fn ingest(&mut self, value: f64) -> Option<f64> {
        if self.samples.len() == WINDOW_CAPACITY {
            if let Some(oldest) = self.samples.pop_front() {
                self.running_sum -= oldest;
            }
        }
        self.samples.push_back(value);
        self.running_sum += value;
        self.counter += 1;

        if self.counter < EMIT_EVERY {
            return None;
        }

        // Exact re-sum once per cycle; evictions leave float drift in the running sum.
        self.counter = 0;
        self.running_sum = self.samples.iter().sum();
        let smoothed = self.running_sum / WINDOW_CAPACITY as f64;
        self.last = Some(smoothed);
        Some(smoothed)
    }

    /// Last emitted smoothed value.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn running_sum(&self) -> f64 {
        self.running_sum
    }

    /// Accepted samples since the last emission (0..EMIT_EVERY).
    pub fn pending(&self) -> u32 {
        self.counter
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}
