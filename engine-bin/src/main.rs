//! Process entry point: parses [`Config`], opens and recovers the durable
//! log, starts the dual worker pools, serves `/metrics`, and shuts down
//! cleanly on Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use engine_core::metrics_server::{MetricsServer, MetricsServerConfig};
use engine_core::{utils, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    let config = engine_core::config::Config::parse();
    config.validate().map_err(anyhow::Error::msg)?;

    utils::logger::init_logger(&config.log_level, config.json_logs);

    tracing::info!(data_dir = %config.data_dir.display(), port = config.port, workers = config.workers, "starting order engine");

    let mut engine = Engine::open(&config.data_dir).context("failed to open durable log")?;
    tracing::info!(
        instruments = engine.recovery.instruments_loaded,
        accounts = engine.recovery.accounts_loaded,
        orders = engine.recovery.orders_loaded,
        rebooked = engine.recovery.orders_rebooked,
        executions = engine.recovery.executions_loaded,
        "recovery complete"
    );

    engine.start(config.workers);

    let metrics_server = MetricsServer::new(
        MetricsServerConfig { listen_addr: config.metrics_addr, metrics_path: "/metrics".to_string() },
        engine.metrics_registry(),
    );
    let metrics_task = tokio::spawn(async move {
        if let Err(err) = metrics_server.serve().await {
            tracing::error!(error = %err, "metrics server exited");
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    let running_signal = running.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        running_signal.store(false, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    tracing::info!("draining in-flight transactions before shutdown");
    engine.shutdown();
    metrics_task.abort();

    tracing::info!("order engine stopped");
    Ok(())
}
