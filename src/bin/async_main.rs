//! Async entry point: the same monitor driven by a tokio interval (see `advanced::async_scheduler`).
//!
//! Stops on Ctrl-C or SIGTERM, or after `--run-for` seconds when given.

use std::{path::PathBuf, sync::atomic::Ordering};

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::time::Duration;

use pms_monitor::{
    acquisition::SimulatedSensor,
    advanced::async_scheduler::{run_async, shutdown_signal},
    config::MonitorConfig,
    hostname,
    scheduler::Scheduler,
    sinks::{AccessoryInfo, PropertyId, PropertyStore, SinkRouter},
    utils::metrics::export_summary_csv,
};

#[derive(Debug, Parser)]
#[command(name = "async_main", version, about = "PMS7003 particulate monitor (tokio)")]
struct Args {
    #[arg(short, long, env = "PMS_MONITOR_CONFIG", default_value = "pms_monitor.toml")]
    config: PathBuf,

    #[arg(long)]
    run_for: Option<u64>,

    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
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
    let scheduler = Scheduler::from_config(SimulatedSensor::new(args.failure_rate), router, &config);
    let running = scheduler.running_flag();

    let task = tokio::spawn(run_async(scheduler));

    shutdown_signal(args.run_for.map(Duration::from_secs)).await;
    info!("[Main] stopping");
    running.store(false, Ordering::Release);

    let scheduler = task.await.context("scheduler task failed")?;
    let stats = scheduler.stats();
    stats.log_summary();
    if let Some(path) = &config.summary_path {
        export_summary_csv(path, &config.name, &stats)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }
    Ok(())
}
