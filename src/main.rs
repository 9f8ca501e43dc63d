//! Oracle Monitor — Entry Point
//!
//! Initializes configuration, logging, chain connections and the
//! oracle engine. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the engine (registry, adapters, scheduler, router, journal)
//! 4. Connect every configured chain concurrently
//! 5. Spawn health/metrics server (/live, /ready, /metrics)
//! 6. Autostart the oracle if `[oracle]` is configured
//! 7. Wait for SIGINT → stop all feeds → shut the server down

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use oracle_monitor::adapters::metrics::{HealthServer, HealthState};
use oracle_monitor::config;
use oracle_monitor::usecases::OracleEngine;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let path = std::env::var("ORACLE_MONITOR_CONFIG").unwrap_or_else(|_| CONFIG_PATH.to_string());
    let config = if std::path::Path::new(&path).exists() {
        config::loader::load_config(&path).context("Failed to load configuration")?
    } else {
        config::AppConfig::default()
    };

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %path,
        chains = config.chains.len(),
        "Starting oracle monitor"
    );

    // ── 3. Build the engine ─────────────────────────────────
    let engine = Arc::new(OracleEngine::from_config(&config).context("Failed to build engine")?);

    // ── 4. Connect chains (failures are per-chain, non-fatal) ─
    let connections = engine.connect_chains(&config.chains).await;
    if connections.iter().all(|c| !c.connected) {
        warn!("No chain connected; on-chain feeds will be unavailable");
    }

    // ── 5. Health / metrics server ──────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let health_handle = if config.metrics.enabled {
        let state = HealthState::new(Arc::clone(engine.registry()), Arc::clone(engine.metrics()));
        let server = HealthServer::new(state, config.metrics.bind_address.clone());
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(rx).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 6. Optional autostart ───────────────────────────────
    if let Some(request) = &config.oracle {
        match engine.start_oracle(request) {
            Ok(keys) => info!(feeds = keys.len(), "Oracle autostarted"),
            Err(e) => warn!(error = %e, "Oracle autostart skipped"),
        }
    }

    info!("Oracle monitor is running");

    // ── 7. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let stopped = engine.stop_all();
    info!(feeds = stopped, "Feeds stopped");

    let _ = shutdown_tx.send(());
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    let stats = engine.log_stats();
    info!(
        entries = stats.total,
        error_rate = stats.error_rate,
        "Shutdown complete"
    );
    Ok(())
}
