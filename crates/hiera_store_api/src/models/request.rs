//! HTTP request type definitions
//!
//! Query string models. Flag parameters follow the presence convention:
//! `?effective` and `?effective=1` both enable the flag.

use hiera_store::{ComponentFilter, ValuesQuery};
use serde::Deserialize;

use crate::errors::ApiError;

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

/// Query parameters of `GET .../values`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValuesParams {
    pub effective: Option<String>,
    pub show_lookup: Option<String>,
    pub key: Option<String>,
}

impl From<ValuesParams> for ValuesQuery {
    fn from(params: ValuesParams) -> Self {
        ValuesQuery {
            effective: params.effective.is_some(),
            show_lookup: params.show_lookup.is_some(),
            key: params.key,
        }
    }
}

/// Query parameters of `GET /resource_definitions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionListParams {
    pub component_id: Option<String>,
}

impl DefinitionListParams {
    /// An empty `component_id` selects definitions without a component.
    pub fn filter(&self) -> Result<ComponentFilter, ApiError> {
        match self.component_id.as_deref() {
            None => Ok(ComponentFilter::All),
            Some("") => Ok(ComponentFilter::Unassigned),
            Some(raw) => raw
                .parse()
                .map(ComponentFilter::Component)
                .map_err(|e: std::num::ParseIntError| ApiError::InvalidQuery {
                    name: "component_id".to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}
