//! SoC thermal protection daemon.
//!
//! Loads the settings file, seeds the governors from the current sensor
//! values, then hands the blocking uevent loop to a dedicated worker thread.
//! SIGINT/SIGTERM request a controlled exit; the main task does nothing but
//! wait for either a signal or the worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use soctherm::config::{DEFAULT_CONFIG_PATH, ThermalConfig};
use soctherm::daemon::ThermalDaemon;
use soctherm::manager::ThermalManager;
use soctherm::power::SystemPower;
use soctherm::thermal::Domain;
use soctherm::tracing::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    soctherm::tracing::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = ThermalConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let manager = Arc::new(Mutex::new(ThermalManager::new(
        config.clone(),
        Arc::new(SystemPower),
    )?));
    let cancel = CancellationToken::new();

    if let Some(interval_ms) = config.board.polling_interval_ms {
        info!(interval_ms, "board polling enabled");
        tokio::spawn(board_poll(manager.clone(), interval_ms, cancel.clone()));
    }

    let mut daemon = ThermalDaemon::new(&config, manager);
    let worker_cancel = cancel.clone();
    let mut worker = tokio::task::spawn_blocking(move || daemon.run(worker_cancel));

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down");
            cancel.cancel();
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
            cancel.cancel();
        }
        result = &mut worker => {
            result??;
            return Ok(());
        }
    }

    worker.await??;
    Ok(())
}

/// Periodic re-evaluation of the board domain, for platforms whose board
/// sensor cannot raise threshold interrupts.
async fn board_poll(
    manager: Arc<Mutex<ThermalManager>>,
    interval_ms: u64,
    cancellation: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = interval.tick() => {
                manager.lock().notify(Domain::Board);
            }
        }
    }
}
