//! Hiera Store REST API Server
//!
//! Main binary for running the API server.
//!
//! # Environment Variables
//!
//! - `HIERA_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `HIERA_API_PORT`: Port to listen on (default: 8080)
//! - `HIERA_API_PREFIX`: URL prefix for all routes (default: none)
//! - `HIERA_DATABASE_URL`: SQLite database URL (default: sqlite://hiera_store.db)
//! - `RUST_LOG`: Log filter (default: info)

use hiera_store::SqlStore;
use hiera_store_api::{ApiConfig, ApiServer, AppState, API_VERSION};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ApiConfig::from_env()?;
    let store = SqlStore::connect(&config.database_url).await?;
    let server = ApiServer::new(config, AppState::new(Arc::new(store)));

    tracing::info!("Starting Hiera Store API server");
    tracing::info!("API version: {}", API_VERSION);

    server.serve().await
}
