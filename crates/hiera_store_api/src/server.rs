//! HTTP server configuration and startup
//!
//! # Environment Variables
//!
//! - `HIERA_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `HIERA_API_PORT`: Port to listen on (default: 8080)
//! - `HIERA_API_PREFIX`: URL prefix all routes are nested under (default: none)
//! - `HIERA_DATABASE_URL`: SQLite database URL (default: sqlite://hiera_store.db)

use axum::Router;
use std::env;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use crate::{routes, AppState, DEFAULT_PORT};

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

pub const HOST_VAR: &str = "HIERA_API_HOST";
pub const PORT_VAR: &str = "HIERA_API_PORT";
pub const PREFIX_VAR: &str = "HIERA_API_PREFIX";
pub const DATABASE_URL_VAR: &str = "HIERA_DATABASE_URL";

/// Database used when `HIERA_DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://hiera_store.db";

/// Invalid server configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{variable} must be an IP address, got '{value}'")]
    InvalidHost { variable: &'static str, value: String },

    #[error("{variable} must be a port number, got '{value}'")]
    InvalidPort { variable: &'static str, value: String },

    #[error("{variable} must be a path such as '/api', got '{value}'")]
    InvalidPrefix { variable: &'static str, value: String },

    #[error("{variable} must be a sqlite:// URL, got '{value}'")]
    InvalidDatabaseUrl { variable: &'static str, value: String },
}

/// API server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Path prefix for every route, e.g. `/api`
    pub prefix: Option<String>,

    /// Database the store persists to
    pub database_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            prefix: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = match lookup(HOST_VAR) {
            Some(value) => {
                value.parse::<IpAddr>().map_err(|_| ConfigError::InvalidHost {
                    variable: HOST_VAR,
                    value: value.clone(),
                })?;
                value
            }
            None => defaults.host,
        };

        let port = match lookup(PORT_VAR) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                variable: PORT_VAR,
                value: value.clone(),
            })?,
            None => defaults.port,
        };

        let prefix = match lookup(PREFIX_VAR) {
            Some(value) => normalize_prefix(&value)?,
            None => None,
        };

        let database_url = match lookup(DATABASE_URL_VAR) {
            Some(value) if value.trim().starts_with("sqlite:") => value.trim().to_string(),
            Some(value) => {
                return Err(ConfigError::InvalidDatabaseUrl {
                    variable: DATABASE_URL_VAR,
                    value,
                })
            }
            None => defaults.database_url,
        };

        Ok(Self {
            port,
            host,
            prefix,
            database_url,
        })
    }
}

/// Normalizes a route prefix to `/segment[/segment...]`.
///
/// An empty value or `/` means no prefix.
fn normalize_prefix(value: &str) -> Result<Option<String>, ConfigError> {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.split('/').any(|segment| segment.is_empty()) || trimmed.contains(['?', '#', ':', '*']) {
        return Err(ConfigError::InvalidPrefix {
            variable: PREFIX_VAR,
            value: value.to_string(),
        });
    }
    Ok(Some(format!("/{}", trimmed)))
}

/// API server
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server with the given configuration.
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone(), self.config.prefix.as_deref())
    }

    /// Start the server and listen for requests.
    ///
    /// This method blocks until the server is shut down gracefully via
    /// CTRL+C (SIGINT) or SIGTERM signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the configured address.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from((self.config.host.parse::<IpAddr>()?, self.config.port));

        tracing::info!("Starting API server on {}", addr);
        if let Some(prefix) = &self.config.prefix {
            tracing::info!("Routes nested under {}", prefix);
        }

        let listener = TcpListener::bind(addr).await?;
        let app = self.router();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Wait for shutdown signal (CTRL+C or SIGTERM)
///
/// If a handler can't be installed the corresponding signal is never
/// observed; the other one still triggers shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
