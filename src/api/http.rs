//! HTTP server setup with Axum

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::counter;
use super::state::AppState;
use crate::utils::parse_env_var;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Read `COUNTER_HOST` and `COUNTER_PORT`, falling back to the defaults
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: parse_env_var("COUNTER_HOST").unwrap_or(default.host),
            port: parse_env_var("COUNTER_PORT").unwrap_or(default.port),
        }
    }

    /// Socket address string for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Counter endpoints
        .route("/counter", get(counter::get_counter))
        .route("/counter/increment", post(counter::increment))
        .route("/counter/audit", get(counter::get_audit))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn start_server<F>(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = config.addr();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting HTTP server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
