//! Lifecycle Server - HTTP front end for lifecycle-core
//!
//! Serves the lifecycle route table over HTTP. The request context (tenant,
//! user, organization, uploaded file) comes from `x-*` headers set by the
//! host platform's gateway.

pub mod config;
pub mod http;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lifecycle_core::{Dispatcher, LifecycleStore};

pub use config::{ConfigError, ServerConfig};

/// Shared application state
pub struct AppState {
    pub store: LifecycleStore,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(store: LifecycleStore) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Open the configured database
    pub fn open(config: &ServerConfig) -> lifecycle_core::Result<Self> {
        let store = LifecycleStore::open_with_timeout(&config.database_path, config.busy_timeout())?;
        tracing::info!(path = %config.database_path.display(), "opened lifecycle database");
        Ok(Self::new(store))
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        // Everything else goes through the lifecycle route table
        .fallback(http::dispatch)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Lifecycle server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
