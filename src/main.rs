//! Live Config Store server.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /api/config ──▶ ┌──────────────┐ ──▶ config.toml (temp + rename)
//!                          │ ConfigStore  │
//!     GET  /api/config ◀── │  (ArcSwap)   │ ◀── StoreWatcher (external edits)
//!                          └──────┬───────┘
//!                                 │ broadcast
//!                                 ▼
//!     GET  /api/ws     ◀── snapshot / partial frames ──▶ Reconcilers
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use live_config::config::{load_config, AppConfig};
use live_config::lifecycle::signals::spawn_signal_handler;
use live_config::observability::{logging, metrics};
use live_config::{ConfigStore, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "live-config")]
#[command(about = "Authoritative store for live configuration", long_about = None)]
struct Cli {
    /// Service configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("live-config v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store_path = %config.store.path,
        broadcast_mode = ?config.store.broadcast_mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(ConfigStore::open(config.store.clone())?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    HttpServer::new(config, store, shutdown).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
