//! HTTP routing configuration
//!
//! # Route Structure
//!
//! - GET    /health
//! - GET    /components, POST /components
//! - GET|PUT|PATCH|DELETE /components/:component_id
//! - GET    /resource_definitions[?component_id=], POST /resource_definitions
//! - GET|PUT|PATCH|DELETE /resource_definitions/:resource_definition_id
//! - PUT|PATCH /resource_definitions/:resource_definition_id/keys/:operation
//! - GET    /environments, POST /environments
//! - GET|PUT|PATCH|DELETE /environments/:environment_id
//! - GET|PUT|PATCH /environments/:environment_id/*rest, see
//!   [`crate::level_paths`]
//!
//! When a prefix is configured every route is nested below it.

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, put},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{handlers, middleware as api_middleware, AppState};

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

/// Create the complete API router with all routes configured.
///
/// This function sets up:
/// - All endpoint routes, nested under `prefix` when given
/// - CORS configuration
/// - Request tracing
/// - Timeout handling
pub fn create_router(state: AppState, prefix: Option<&str>) -> Router {
    // Configure CORS for web UI support
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().include_headers(true))
        .on_response(DefaultOnResponse::new().include_headers(true));

    // Configure request timeout (30 seconds)
    let timeout_layer = TimeoutLayer::new(Duration::from_secs(30));

    let api = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(component_routes())
        .merge(resource_definition_routes())
        .merge(environment_routes())
        .layer(middleware::from_fn(api_middleware::tracing_middleware))
        .layer(timeout_layer)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state);

    match prefix {
        Some(prefix) => Router::new().nest(prefix, api),
        None => api,
    }
}

fn component_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/components",
            get(handlers::list_components).post(handlers::create_component),
        )
        .route(
            "/components/:component_id",
            get(handlers::get_component)
                .put(handlers::update_component)
                .patch(handlers::update_component)
                .delete(handlers::delete_component),
        )
}

fn resource_definition_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/resource_definitions",
            get(handlers::list_resource_definitions).post(handlers::create_resource_definition),
        )
        .route(
            "/resource_definitions/:resource_definition_id",
            get(handlers::get_resource_definition)
                .put(handlers::update_resource_definition)
                .patch(handlers::update_resource_definition)
                .delete(handlers::delete_resource_definition),
        )
        .route(
            "/resource_definitions/:resource_definition_id/keys/:operation",
            put(handlers::update_resource_definition_keys)
                .patch(handlers::update_resource_definition_keys),
        )
}

fn environment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/environments",
            get(handlers::list_environments).post(handlers::create_environment),
        )
        .route(
            "/environments/:environment_id",
            get(handlers::get_environment)
                .put(handlers::update_environment)
                .patch(handlers::update_environment)
                .delete(handlers::delete_environment),
        )
        .route(
            "/environments/:environment_id/*rest",
            get(handlers::get_environment_path)
                .put(handlers::update_environment_path)
                .patch(handlers::update_environment_path),
        )
}
