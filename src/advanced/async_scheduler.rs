//! Async scheduling path: the same poll cycle driven by a tokio interval.
//!
//! The first interval tick completes immediately, which gives the startup poll; missed
//! ticks are skipped rather than replayed. The sensor read still blocks inline for at
//! most its timeout, so this task should own a worker rather than share one with
//! latency-sensitive work.

use std::time::Duration;

use log::{info, warn};
use tokio::time::{self, MissedTickBehavior};

use crate::acquisition::SensorPort;
use crate::scheduler::Scheduler;

/// Run `scheduler` until its running flag is cleared, then hand it back for stats.
pub async fn run_async<S: SensorPort>(mut scheduler: Scheduler<S>) -> Scheduler<S> {
    let mut interval = time::interval(scheduler.period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("[AsyncScheduler] started period={:?}", scheduler.period());
    scheduler.setup();

    while scheduler.is_running() {
        interval.tick().await;
        if !scheduler.is_running() {
            break;
        }
        scheduler.poll_once();
    }

    scheduler.teardown();
    scheduler
}

/// Resolves on Ctrl-C, on SIGTERM (unix), or once `run_for` has elapsed.
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal(run_for: Option<Duration>) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Shutdown] failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("[Shutdown] failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let deadline = async {
        match run_for {
            Some(d) => time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupt => info!("[Shutdown] interrupted"),
        _ = terminate => info!("[Shutdown] terminated"),
        _ = deadline => info!("[Shutdown] run time elapsed"),
    }
}
