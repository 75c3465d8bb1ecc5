//! # PMS7003 Monitor Entry Point
//!
//! Threaded runtime: the scheduler owns one thread and paces itself with a spin sleeper.
//!
//! ## Flow
//! - Load `MonitorConfig` (missing file → defaults)
//! - Build the property store, the sink router (history / telemetry per config) and the scheduler
//! - Poll until Ctrl-C / SIGTERM, or until `--run-for` elapses; the sensor is released on the way out
//! - Log the run summary and append it to `summary_path` if configured
//!
//! ## Outputs
//! - `<history_storage_path>/<name>_history.csv` when history is enabled
//! - MQTT topics under `PMS7003/` when telemetry is enabled

use std::{path::PathBuf, sync::atomic::Ordering, thread, time::Duration};

use anyhow::{Context, anyhow};
use clap::Parser;
use log::info;

use pms_monitor::{
    acquisition::SimulatedSensor,
    advanced::async_scheduler::shutdown_signal,
    config::MonitorConfig,
    hostname,
    scheduler::Scheduler,
    sinks::{AccessoryInfo, PropertyId, PropertyStore, SinkRouter},
    utils::metrics::export_summary_csv,
};

#[derive(Debug, Parser)]
#[command(name = "pms_monitor", version, about = "PMS7003 particulate monitor")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PMS_MONITOR_CONFIG", default_value = "pms_monitor.toml")]
    config: PathBuf,

    /// Stop after this many seconds instead of running forever
    #[arg(long)]
    run_for: Option<u64>,

    /// Probability that a simulated read fails (0.0..=1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = MonitorConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let host = hostname();
    let store = PropertyStore::new(
        AccessoryInfo::for_host(&config.name, &host),
        &PropertyId::exposed(config.show_temperature_tile, config.show_humidity_tile),
    );
    let router = SinkRouter::from_config(&config, Box::new(store.clone()), &format!("{}-pms", host));
    let mut scheduler = Scheduler::from_config(SimulatedSensor::new(args.failure_rate), router, &config);
    let running = scheduler.running_flag();

    let handle = thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || {
            scheduler.run();
            scheduler
        })
        .context("spawning scheduler thread")?;

    // Signals only; the poll loop stays on its own thread.
    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    signals.block_on(shutdown_signal(args.run_for.map(Duration::from_secs)));
    info!("[Main] stopping");
    running.store(false, Ordering::Release);

    let scheduler = handle
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))?;

    for (id, state) in store.snapshot() {
        info!("[Main] {} = {:?}", id.name(), state);
    }

    let stats = scheduler.stats();
    stats.log_summary();
    if let Some(path) = &config.summary_path {
        export_summary_csv(path, &config.name, &stats)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }
    Ok(())
}
