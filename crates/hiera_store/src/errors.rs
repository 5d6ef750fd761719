//! Hierarchical store error types.
//!
//! Every failure the core can produce is a variant of [`HieraError`]. The
//! messages are part of the public contract: they carry enough of the
//! offending input (expected vs. actual level name, the failing key path,
//! the duplicated identifiers) for a client to reconstruct what went wrong.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors raised by the hierarchical configuration store.
///
/// The HTTP boundary maps each variant to a status code through
/// [`HieraError::kind`]; the core never retries or swallows them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HieraError {
    /// A referenced entity does not exist.
    #[error("{entity} not found by {identifier}")]
    NotFound { entity: String, identifier: String },

    /// A requested level name does not match the declared hierarchy.
    #[error("Unexpected level name '{actual}'. Expected '{expected}'.")]
    LevelNameMismatch { expected: String, actual: String },

    /// The requested level path is longer than the declared hierarchy.
    #[error("Levels {requested:?} can't be matched with environment {environment_id} levels {declared:?}")]
    LevelsUnmatched {
        environment_id: i64,
        requested: Vec<String>,
        declared: Vec<String>,
    },

    /// A uniqueness or structural integrity rule was violated.
    #[error("{message}")]
    IntegrityConflict { message: String },

    /// A key path is shorter than the operation requires, or holds an
    /// element that cannot address a document.
    #[error("Keys path {path} invalid. {reason}")]
    InvalidPath { path: String, reason: String },

    /// A key or index addressed by a key path does not exist.
    #[error("Keys path doesn't exist {path}. Failed on the key {key}")]
    PathNotFound { path: String, key: String },

    /// A key path continues past a leaf value.
    #[error("Leaf value {leaf} found on key {key} in keys path {path}")]
    PathUnreachable {
        path: String,
        key: String,
        leaf: String,
    },

    /// The keys operation tag is neither `set` nor `delete`.
    #[error("Unknown operation: {operation}. Allowed operations: set, delete")]
    UnknownOperation { operation: String },

    /// A stored document that must be merged is not a JSON object.
    #[error("Resource {document} at {lookup_path} is {found}, expected an object")]
    DocumentNotObject {
        document: String,
        lookup_path: String,
        found: String,
    },

    /// The request itself is malformed.
    #[error("{message}")]
    RequestValidation { message: String },

    /// Unexpected persistence failure.
    #[error("Store failure: {reason}")]
    Store { reason: String },
}

impl HieraError {
    /// Creates a `NotFound` error for the given table and identifier.
    pub fn not_found(entity: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// Creates an `IntegrityConflict` error with the given message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::IntegrityConflict {
            message: message.into(),
        }
    }

    /// Creates a `RequestValidation` error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::RequestValidation {
            message: message.into(),
        }
    }

    /// Returns a stable machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            HieraError::NotFound { .. } => "NotFound",
            HieraError::LevelNameMismatch { .. } => "LevelNameMismatch",
            HieraError::LevelsUnmatched { .. } => "LevelsUnmatched",
            HieraError::IntegrityConflict { .. } => "IntegrityConflict",
            HieraError::InvalidPath { .. } => "InvalidPath",
            HieraError::PathNotFound { .. } => "PathNotFound",
            HieraError::PathUnreachable { .. } => "PathUnreachable",
            HieraError::UnknownOperation { .. } => "UnknownOperation",
            HieraError::DocumentNotObject { .. } => "DocumentNotObject",
            HieraError::RequestValidation { .. } => "RequestValidation",
            HieraError::Store { .. } => "StoreError",
        }
    }

    /// Returns `true` for errors produced by the key-path editor.
    pub fn is_key_path_error(&self) -> bool {
        matches!(
            self,
            HieraError::InvalidPath { .. }
                | HieraError::PathNotFound { .. }
                | HieraError::PathUnreachable { .. }
                | HieraError::UnknownOperation { .. }
        )
    }
}

impl From<sqlx::Error> for HieraError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                HieraError::conflict(db.message())
            }
            _ => HieraError::Store {
                reason: err.to_string(),
            },
        }
    }
}

/// Result type alias for store operations.
pub type HieraResult<T> = Result<T, HieraError>;
