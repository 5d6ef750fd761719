//! HTTP request handlers
//!
//! Handlers translate HTTP requests to calls on the `hiera_store` services
//! and service results to HTTP responses. Creates answer `201 Created` with
//! the representation; updates and deletes answer `204 No Content`.
//!
//! Everything below `/environments/:environment_id/` goes through one
//! catch-all route per method group, parsed by [`crate::level_paths`].

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use hiera_store::{
    ComponentUpdate, ComponentView, DocumentKind, EnvironmentUpdate, EnvironmentView,
    HierarchyLevelUpdate, NewComponent, NewEnvironment, NewResourceDefinition,
    ResourceDefinition, ResourceDefinitionUpdate, ValuesQuery,
};
use serde_json::Value;

use crate::{
    errors::ApiError,
    level_paths::{canonical_location, parse_environment_path, EnvironmentPath, ResourcePath},
    models::{DefinitionListParams, HealthCheckResponse, ValuesParams},
    AppState,
};

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;

/// A batch of key paths as sent to `keys/<operation>` endpoints.
pub type KeyPathBatch = Vec<Vec<Value>>;

/// GET /health
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------- components

/// GET /components
pub async fn list_components(
    State(state): State<AppState>,
) -> Result<Json<Vec<ComponentView>>, ApiError> {
    Ok(Json(state.components.list().await?))
}

/// POST /components
pub async fn create_component(
    State(state): State<AppState>,
    Json(request): Json<NewComponent>,
) -> Result<(StatusCode, Json<ComponentView>), ApiError> {
    let component = state.components.create(request).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

/// GET /components/:component_id
pub async fn get_component(
    State(state): State<AppState>,
    Path(component_id): Path<i64>,
) -> Result<Json<ComponentView>, ApiError> {
    Ok(Json(state.components.get(component_id).await?))
}

/// PUT|PATCH /components/:component_id
pub async fn update_component(
    State(state): State<AppState>,
    Path(component_id): Path<i64>,
    Json(update): Json<ComponentUpdate>,
) -> Result<StatusCode, ApiError> {
    state.components.update(component_id, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /components/:component_id
pub async fn delete_component(
    State(state): State<AppState>,
    Path(component_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.components.delete(component_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ------------------------------------------------------ resource definitions

/// GET /resource_definitions[?component_id=<id>]
pub async fn list_resource_definitions(
    State(state): State<AppState>,
    Query(params): Query<DefinitionListParams>,
) -> Result<Json<Vec<ResourceDefinition>>, ApiError> {
    let filter = params.filter()?;
    Ok(Json(state.resource_definitions.list(filter).await?))
}

/// POST /resource_definitions
pub async fn create_resource_definition(
    State(state): State<AppState>,
    Json(request): Json<NewResourceDefinition>,
) -> Result<(StatusCode, Json<ResourceDefinition>), ApiError> {
    let definition = state.resource_definitions.create(request).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

/// GET /resource_definitions/:resource_definition_id
pub async fn get_resource_definition(
    State(state): State<AppState>,
    Path(resource_definition_id): Path<i64>,
) -> Result<Json<ResourceDefinition>, ApiError> {
    Ok(Json(
        state.resource_definitions.get(resource_definition_id).await?,
    ))
}

/// PUT|PATCH /resource_definitions/:resource_definition_id
pub async fn update_resource_definition(
    State(state): State<AppState>,
    Path(resource_definition_id): Path<i64>,
    Json(update): Json<ResourceDefinitionUpdate>,
) -> Result<StatusCode, ApiError> {
    state
        .resource_definitions
        .update(resource_definition_id, update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /resource_definitions/:resource_definition_id
pub async fn delete_resource_definition(
    State(state): State<AppState>,
    Path(resource_definition_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .resource_definitions
        .delete(resource_definition_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT|PATCH /resource_definitions/:resource_definition_id/keys/:operation
pub async fn update_resource_definition_keys(
    State(state): State<AppState>,
    Path((resource_definition_id, operation)): Path<(i64, String)>,
    Json(key_paths): Json<KeyPathBatch>,
) -> Result<StatusCode, ApiError> {
    state
        .resource_definitions
        .update_keys(resource_definition_id, &operation, &key_paths)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -------------------------------------------------------------- environments

/// GET /environments
pub async fn list_environments(
    State(state): State<AppState>,
) -> Result<Json<Vec<EnvironmentView>>, ApiError> {
    Ok(Json(state.environments.list().await?))
}

/// POST /environments
pub async fn create_environment(
    State(state): State<AppState>,
    Json(request): Json<NewEnvironment>,
) -> Result<(StatusCode, Json<EnvironmentView>), ApiError> {
    let environment = state.environments.create(request).await?;
    Ok((StatusCode::CREATED, Json(environment)))
}

/// GET /environments/:environment_id
pub async fn get_environment(
    State(state): State<AppState>,
    Path(environment_id): Path<i64>,
) -> Result<Json<EnvironmentView>, ApiError> {
    Ok(Json(state.environments.get(environment_id).await?))
}

/// PUT|PATCH /environments/:environment_id
pub async fn update_environment(
    State(state): State<AppState>,
    Path(environment_id): Path<i64>,
    Json(update): Json<EnvironmentUpdate>,
) -> Result<StatusCode, ApiError> {
    state.environments.update(environment_id, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /environments/:environment_id
pub async fn delete_environment(
    State(state): State<AppState>,
    Path(environment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.environments.delete(environment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ------------------------------------------------------ environment sub-paths

fn parse_rest(rest: &str) -> Result<EnvironmentPath, ApiError> {
    parse_environment_path(rest).ok_or_else(|| ApiError::RouteNotFound {
        path: rest.to_string(),
    })
}

fn method_not_allowed(method: &Method, uri: &Uri) -> ApiError {
    ApiError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

/// Redirects name-addressed resource URLs, and ids written with leading
/// zeros, to their id-addressed form.
///
/// Returns `None` when the URL already addresses the resource by id.
async fn redirect_to_canonical(
    state: &AppState,
    environment_id: i64,
    path: &ResourcePath,
    uri: &Uri,
) -> Result<Option<Response>, ApiError> {
    if path.is_canonical() {
        return Ok(None);
    }

    let resource_id = match path.resource.as_id() {
        Some(id) => id,
        None => {
            state
                .resource_values
                .resolve_resource(environment_id, &path.resource)
                .await?
                .id
        }
    };
    let location = canonical_location(uri.path(), uri.query(), path, resource_id).ok_or_else(
        || ApiError::RouteNotFound {
            path: uri.path().to_string(),
        },
    )?;

    tracing::debug!(location = %location, "Redirecting to id-addressed resource");
    Ok(Some(Redirect::permanent(&location).into_response()))
}

/// GET /environments/:environment_id/*rest
///
/// - `hierarchy_levels` - the level chain
/// - `hierarchy_levels/:name` - one level
/// - `{level/value/}*resources/:id/values[?effective][&show_lookup][&key=a.b]`
/// - `{level/value/}*resources/:id/overrides`
pub async fn get_environment_path(
    State(state): State<AppState>,
    Path((environment_id, rest)): Path<(i64, String)>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ValuesParams>,
) -> Result<Response, ApiError> {
    match parse_rest(&rest)? {
        EnvironmentPath::HierarchyLevels => Ok(Json(
            state.environments.list_hierarchy_levels(environment_id).await?,
        )
        .into_response()),
        EnvironmentPath::HierarchyLevel(name) => Ok(Json(
            state
                .environments
                .get_hierarchy_level(environment_id, &name)
                .await?,
        )
        .into_response()),
        EnvironmentPath::Resource(path) => {
            if path.keys_operation.is_some() {
                return Err(method_not_allowed(&Method::GET, &uri));
            }
            if let Some(redirect) =
                redirect_to_canonical(&state, environment_id, &path, &uri).await?
            {
                return Ok(redirect);
            }

            let document = match path.document {
                DocumentKind::Values => {
                    let query = ValuesQuery::from(params);
                    state
                        .resource_values
                        .get_values(environment_id, &path.levels, &path.resource, &query)
                        .await?
                }
                DocumentKind::Overrides => {
                    state
                        .resource_values
                        .get_overrides(environment_id, &path.levels, &path.resource)
                        .await?
                }
            };
            Ok(Json(document).into_response())
        }
    }
}

/// PUT|PATCH /environments/:environment_id/*rest
///
/// - `hierarchy_levels/:name` - rename a level
/// - `{level/value/}*resources/:id/(values|overrides)` - replace a document (PUT)
/// - `{level/value/}*resources/:id/(values|overrides)/keys/:operation` -
///   apply a key-path batch
pub async fn update_environment_path(
    State(state): State<AppState>,
    Path((environment_id, rest)): Path<(i64, String)>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    match parse_rest(&rest)? {
        EnvironmentPath::HierarchyLevels => Err(method_not_allowed(&method, &uri)),
        EnvironmentPath::HierarchyLevel(name) => {
            let update: HierarchyLevelUpdate =
                serde_json::from_value(body).map_err(ApiError::invalid_body)?;
            state
                .environments
                .update_hierarchy_level(environment_id, &name, update)
                .await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        EnvironmentPath::Resource(path) => {
            if path.keys_operation.is_none() && method != Method::PUT {
                return Err(method_not_allowed(&method, &uri));
            }
            if let Some(redirect) =
                redirect_to_canonical(&state, environment_id, &path, &uri).await?
            {
                return Ok(redirect);
            }

            match &path.keys_operation {
                Some(operation) => {
                    let key_paths: KeyPathBatch =
                        serde_json::from_value(body).map_err(ApiError::invalid_body)?;
                    state
                        .resource_values
                        .update_keys(
                            environment_id,
                            &path.levels,
                            &path.resource,
                            path.document,
                            operation,
                            &key_paths,
                        )
                        .await?;
                }
                None => {
                    state
                        .resource_values
                        .put_document(
                            environment_id,
                            &path.levels,
                            &path.resource,
                            path.document,
                            body,
                        )
                        .await?;
                }
            }
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
