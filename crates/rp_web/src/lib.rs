//! Local HTTP control plane that browser-side callers use to trigger syncs.

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub const SERVICE_NAME: &str = "repost-sync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3456,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/sync", post(handlers::sync))
        .route("/extract", post(handlers::extract))
        .route("/pending", get(handlers::pending))
        .fallback(handlers::not_found)
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(config: ServerConfig, state: AppState) -> rp_core::Result<()> {
    let app = create_app(state).await;
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    info!("🌍 Sync service listening on http://{}", config.addr());
    info!("   Health: GET http://{}/health", config.addr());
    info!("   Sync:   POST http://{}/sync", config.addr());
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{AppState, ServerConfig};
    pub use rp_core::{Error, Result, SyncContent, SyncReport};
}
