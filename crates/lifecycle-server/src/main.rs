//! Lifecycle Server Binary
//!
//! Standalone server for the lifecycle tracking API.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use lifecycle_server::{serve, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;

    // Initialize logging; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let state = Arc::new(AppState::open(&config)?);
    serve(&config.bind_addr, state).await
}
