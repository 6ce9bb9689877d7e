//! Shared Counter Server - Binary Entry Point
//!
//! This is the main entry point for the counter-server binary.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use shared_counter::api::{start_server, AppState, ServerConfig};
use shared_counter::counter_store::DEFAULT_BUSY_TIMEOUT;
use shared_counter::{CounterStore, SqliteRepository, StoreConfig, NAME, VERSION};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shared_counter=info".parse()?))
        .init();

    tracing::info!("{} {} starting...", NAME, VERSION);

    let db_path = std::env::var("COUNTER_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data").join("app.db"));
    let repository = SqliteRepository::open(&db_path)?;
    tracing::info!("Opened SQLite at {}", db_path.display());

    let config = StoreConfig::from_env();
    // A call waiting on another process's write lock must not outlive its deadline
    if let Some(timeout) = config.timeout {
        repository.set_busy_timeout(timeout.min(DEFAULT_BUSY_TIMEOUT))?;
    }

    // Bootstrap runs here, before any request is served
    let store = Arc::new(CounterStore::open(repository, config)?);
    let state = Arc::new(AppState::new(store));

    start_server(ServerConfig::from_env(), state, shutdown_signal()).await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown requested");
}
