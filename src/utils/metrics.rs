//! Run statistics for the monitor.
//!
//! - **SinkCounters:** per-sink delivered / failed / skipped counts, owned by the router.
//! - **PipelineStats:** poll-level counts plus the three sink counters, assembled by the
//!   scheduler for the shutdown log line and the optional CSV summary row.

use std::{
    fs::{create_dir_all, OpenOptions},
    path::Path,
};

use csv::WriterBuilder;
use log::info;
use serde::Serialize;

use crate::error::SinkError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkCounters {
    pub delivered: u64,
    pub failed: u64,
    /// Calls dropped on purpose: disconnected transport or blank topic.
    pub skipped: u64,
}

impl SinkCounters {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub polls: u64,
    pub read_failures: u64,
    pub rejected_samples: u64,
    pub updates: u64,
    pub properties: SinkCounters,
    pub history: SinkCounters,
    pub telemetry: SinkCounters,
}

impl PipelineStats {
    /// Percentage of polls that failed to read; 0 before the first poll.
    pub fn failure_rate(&self) -> f64 {
        if self.polls == 0 {
            0.0
        } else {
            self.read_failures as f64 / self.polls as f64 * 100.0
        }
    }

    pub fn log_summary(&self) {
        info!(
            "[Stats] polls={} read_failures={} ({:.2}%) rejected={} updates={}",
            self.polls,
            self.read_failures,
            self.failure_rate(),
            self.rejected_samples,
            self.updates
        );
        info!(
            "[Stats] properties ok/fail={}/{} history ok/fail={}/{} telemetry ok/fail/skip={}/{}/{}",
            self.properties.delivered,
            self.properties.failed,
            self.history.delivered,
            self.history.failed,
            self.telemetry.delivered,
            self.telemetry.failed,
            self.telemetry.skipped
        );
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    name: &'a str,
    polls: u64,
    read_failures: u64,
    failure_rate: String,
    rejected_samples: u64,
    updates: u64,
    property_failures: u64,
    history_entries: u64,
    history_failures: u64,
    telemetry_published: u64,
    telemetry_failures: u64,
    telemetry_skipped: u64,
}

/// Append one summary row for this run; the header is written when the file is new.
pub fn export_summary_csv(
    path: &Path,
    name: &str,
    stats: &PipelineStats,
) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    let file_exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(SummaryRow {
        name,
        polls: stats.polls,
        read_failures: stats.read_failures,
        failure_rate: format!("{:.2}", stats.failure_rate()),
        rejected_samples: stats.rejected_samples,
        updates: stats.updates,
        property_failures: stats.properties.failed,
        history_entries: stats.history.delivered,
        history_failures: stats.history.failed,
        telemetry_published: stats.telemetry.delivered,
        telemetry_failures: stats.telemetry.failed,
        telemetry_skipped: stats.telemetry.skipped,
    })?;
    writer.flush()?;
    info!("[Stats] summary appended to {:?}", path);
    Ok(())
}
