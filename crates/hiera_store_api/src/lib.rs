//! Hiera Store REST API
//!
//! HTTP boundary of the hierarchical configuration store. Exposes the
//! administrative resources (components, resource definitions,
//! environments, hierarchy levels) and the per-level resource values and
//! overrides of the `hiera_store` crate.
//!
//! # Architecture
//!
//! This crate only handles:
//! - HTTP request/response translation
//! - The level-path URL grammar
//! - Error mapping from domain to HTTP
//! - Routing, middleware and server configuration
//!
//! Business rules live in `hiera_store`; the dependency flows
//! HTTP API → core, never the reverse.

pub mod errors;
pub mod handlers;
pub mod level_paths;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

use hiera_store::{
    ComponentsService, ConfigStore, EnvironmentsService, ResourceDefinitionsService,
    ResourceValuesService,
};
use std::sync::Arc;

pub use errors::{ApiError, ErrorResponse};
pub use server::{ApiConfig, ApiServer, ConfigError};

/// API version
pub const API_VERSION: &str = "v1";

/// Default API port
pub const DEFAULT_PORT: u16 = 8080;

/// Application state shared across handlers
///
/// Every service shares the same store; each request opens its own
/// transaction through it.
#[derive(Clone)]
pub struct AppState {
    pub components: ComponentsService,
    pub resource_definitions: ResourceDefinitionsService,
    pub environments: EnvironmentsService,
    pub resource_values: ResourceValuesService,
}

impl AppState {
    /// Create application state backed by `store`.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            components: ComponentsService::new(store.clone()),
            resource_definitions: ResourceDefinitionsService::new(store.clone()),
            environments: EnvironmentsService::new(store.clone()),
            resource_values: ResourceValuesService::new(store),
        }
    }
}

/// State backed by a fresh in-memory database.
#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    let store = hiera_store::SqlStore::in_memory().await.unwrap();
    AppState::new(Arc::new(store))
}
