//! Error handling and HTTP error conversion
//!
//! Domain errors from `hiera_store` are converted to HTTP responses at this
//! boundary. Every error response has the same JSON shape:
//!
//! ```json
//! {"error": {"code": "LevelNameMismatch", "message": "Unexpected level name 'x'. Expected 'region'."}}
//! ```
//!
//! Status mapping:
//!
//! | Domain error                                           | Status |
//! |--------------------------------------------------------|--------|
//! | `NotFound`                                             | 404    |
//! | `LevelNameMismatch`, `LevelsUnmatched`, `RequestValidation` | 400 |
//! | `IntegrityConflict`, `DocumentNotObject`, key-path errors | 409  |
//! | `Store`                                                | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hiera_store::HieraError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Standard error response for all API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional context, shape varies by error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Errors returned from handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] HieraError),

    /// The URL matched no route shape.
    #[error("No route for path {path}")]
    RouteNotFound { path: String },

    #[error("Method {method} is not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    /// The request body didn't have the expected shape.
    #[error("Invalid request body: {reason}")]
    InvalidBody { reason: String },

    #[error("Invalid query parameter '{name}': {reason}")]
    InvalidQuery { name: String, reason: String },
}

impl ApiError {
    pub fn invalid_body(err: impl std::fmt::Display) -> Self {
        ApiError::InvalidBody {
            reason: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => domain_status(err),
            ApiError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidBody { .. } | ApiError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) => err.kind(),
            ApiError::RouteNotFound { .. } => "NotFound",
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::InvalidBody { .. } | ApiError::InvalidQuery { .. } => "ValidationError",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Domain(HieraError::LevelsUnmatched {
                environment_id,
                requested,
                declared,
            }) => Some(json!({
                "environment_id": environment_id,
                "requested": requested,
                "declared": declared,
            })),
            ApiError::InvalidQuery { name, .. } => Some(json!({ "parameter": name })),
            _ => None,
        }
    }
}

/// Maps a domain error to its HTTP status.
pub fn domain_status(err: &HieraError) -> StatusCode {
    match err {
        HieraError::NotFound { .. } => StatusCode::NOT_FOUND,
        HieraError::LevelNameMismatch { .. }
        | HieraError::LevelsUnmatched { .. }
        | HieraError::RequestValidation { .. } => StatusCode::BAD_REQUEST,
        HieraError::IntegrityConflict { .. } | HieraError::DocumentNotObject { .. } => {
            StatusCode::CONFLICT
        }
        err if err.is_key_path_error() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts an error into its status code and response body.
pub fn convert_error(err: &ApiError) -> (StatusCode, ErrorResponse) {
    let status = err.status();
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        "An internal error occurred".to_string()
    } else {
        err.to_string()
    };

    (
        status,
        ErrorResponse {
            error: ErrorDetails {
                code: err.code().to_string(),
                message,
                details: err.details(),
            },
        },
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = convert_error(&self);

        log_error(&self, status);

        (status, Json(error_response)).into_response()
    }
}

/// Log error with appropriate level based on HTTP status
fn log_error(error: &ApiError, status: StatusCode) {
    if status.is_server_error() {
        tracing::error!("API error: {} - {}", status, error);
    } else {
        tracing::warn!("API error: {} - {}", status, error);
    }
}
