//! # Surelink
//!
//! URL shortener backend with captcha-gated link creation.
//!
//! ## Architecture
//! ```text
//! Refill Job → Renderer → Captcha Queue ─┐
//!                                        ├─ Redis (shared cache state)
//! HTTP → Captcha / Redirection services ─┘
//!                     ↓
//!             Postgres (short links)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod config;
mod links;
mod random;
mod redirect;
mod routes;
mod state;
mod stats;
mod store;

use captcha::captcha_refill_worker;
use config::AppConfig;
use state::AppState;
use stats::stats_publisher_worker;

/// Surelink - captcha-gated URL shortener
#[derive(Parser, Debug)]
#[command(name = "surelink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/surelink.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Postgres URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Keep all state in-process (development only)
    #[arg(long, default_value = "false")]
    memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading env-backed arguments
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Surelink v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(node_id = %config.node_id, "Configuration loaded from {}", args.config);

    let refill_interval = config.captcha.refill_interval();
    let stats_interval = std::time::Duration::from_secs(config.stats.flush_interval_secs);
    let listen_addr = config.listen_addr.clone();

    // Initialize application state
    let state = AppState::new(config).await?;

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn captcha refill worker
    let refill = state.refill.clone();
    let refill_shutdown = shutdown_tx.subscribe();
    let refill_handle = tokio::spawn(async move {
        captcha_refill_worker(refill, refill_interval, refill_shutdown).await;
    });

    // Spawn stats publisher
    let stat_cache = state.stat_cache.clone();
    let stats_shutdown = shutdown_tx.subscribe();
    let stats_handle = tokio::spawn(async move {
        stats_publisher_worker(stat_cache, stats_interval, stats_shutdown).await;
    });

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("Surelink listening on {}", listen_addr);

    // Handle graceful shutdown
    let signal_tx = shutdown_tx.clone();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = signal_tx.send(());
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    // Stop background workers even if the server failed
    let _ = shutdown_tx.send(());
    join_workers(vec![
        ("captcha_refill", refill_handle),
        ("stats_publisher", stats_handle),
    ])
    .await;

    served?;
    info!("Surelink shutdown complete");
    Ok(())
}

/// Wait for background workers, logging any that panicked or were cancelled.
/// Returns how many did not finish cleanly.
async fn join_workers(workers: Vec<(&'static str, JoinHandle<()>)>) -> usize {
    let mut failed = 0;
    for (name, handle) in workers {
        if let Err(e) = handle.await {
            tracing::error!(worker = name, error = %e, "Background worker terminated abnormally");
            failed += 1;
        }
    }
    failed
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_workers_reports_panicked_worker() {
        let clean = tokio::spawn(async {});
        let panicked = tokio::spawn(async { panic!("worker blew up") });

        let failed = join_workers(vec![("clean", clean), ("panicked", panicked)]).await;
        assert_eq!(failed, 1);
    }
}
