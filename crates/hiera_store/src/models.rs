//! Persisted entities of the hierarchical configuration store.
//!
//! The five tables are components, resource definitions, environments
//! (with their ordered hierarchy levels), level values and resource values
//! rows. Documents are stored as opaque [`serde_json::Value`] blobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// A named owner of resource definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: i64,
    pub name: String,
}

/// A named configuration schema or template, optionally owned by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub id: i64,
    pub name: String,
    pub component_id: Option<i64>,
    pub content: Value,
}

/// An instantiation context activating an ordered list of components.
///
/// The hierarchy levels are stored separately; see [`HierarchyLevel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub components: Vec<i64>,
}

/// One rung of an environment's linear level chain.
///
/// `parent_id` points at the previous level in the chain, `None` for the
/// first level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub id: i64,
    pub name: String,
    pub environment_id: i64,
    pub parent_id: Option<i64>,
}

/// A concrete value instantiating a hierarchy level, e.g. `region=us-east`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelValue {
    pub id: i64,
    pub level_id: i64,
    pub value: String,
}

/// The storage unit for one (environment, resource definition, level value).
///
/// A `level_value_id` of `None` is the root scope of the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceValues {
    pub id: i64,
    pub environment_id: i64,
    pub resource_definition_id: i64,
    pub level_value_id: Option<i64>,
    pub values: Value,
    pub overrides: Value,
}

impl ResourceValues {
    /// Returns the document of the given kind.
    pub fn document(&self, kind: DocumentKind) -> &Value {
        match kind {
            DocumentKind::Values => &self.values,
            DocumentKind::Overrides => &self.overrides,
        }
    }

    /// Replaces the document of the given kind.
    pub fn set_document(&mut self, kind: DocumentKind, document: Value) {
        match kind {
            DocumentKind::Values => self.values = document,
            DocumentKind::Overrides => self.overrides = document,
        }
    }
}

/// Selects one of the two independent documents of a resource values row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Values,
    Overrides,
}

impl DocumentKind {
    /// Returns the route segment naming this document.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Values => "values",
            DocumentKind::Overrides => "overrides",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity reference that is either a numeric id or a name.
///
/// Deserializes from a JSON number or string, so request bodies such as
/// `{"components": [7, "component2"]}` can mix both forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Id(i64),
    Name(String),
}

impl Identifier {
    /// Parses a URL segment: all-digit segments are ids, anything else a name.
    pub fn parse(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = segment.parse::<i64>() {
                return Identifier::Id(id);
            }
        }
        Identifier::Name(segment.to_string())
    }

    /// Returns the id if this identifier is numeric.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            Identifier::Id(id) => Some(*id),
            Identifier::Name(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

/// One requested `(level name, level value)` pair of a level path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelPair {
    pub name: String,
    pub value: String,
}

impl LevelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
