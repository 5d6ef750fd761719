//! Effective value computation.
//!
//! The effective document of a resource at a level path is built by
//! overlaying the stored documents from the root scope down to the deepest
//! requested level:
//!
//! 1. root `values`, then root `overrides`
//! 2. for each resolved level, shallowest first: that level's `values`,
//!    then its `overrides`
//!
//! Each overlay replaces whole top-level keys; nested structures are not
//! merged. When tracing is requested every key is paired with the lookup
//! path that was current when it was last written, e.g.
//! `/region/us-east/cluster/c1/`.
//!
//! Every contributing document must be an object. A scope holding anything
//! else fails the whole computation with
//! [`HieraError::DocumentNotObject`].

use crate::{
    errors::{HieraError, HieraResult},
    levels::ResolvedLevel,
    models::{DocumentKind, ResourceValues},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[cfg(test)]
#[path = "effective_tests.rs"]
mod tests;

/// Lookup path of the root scope.
pub const ROOT_LOOKUP_PATH: &str = "/";

/// A merged value paired with the lookup path of the scope that wrote it.
///
/// Serializes as a two-element array `[value, lookup_path]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupEntry(pub Value, pub String);

/// Result of an effective computation.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveDocument {
    /// Key to merged value.
    Plain(Map<String, Value>),
    /// Key to merged value and the lookup path that provided it.
    Traced(BTreeMap<String, LookupEntry>),
}

impl EffectiveDocument {
    /// Converts the result into the JSON document returned to clients.
    pub fn into_json(self) -> Value {
        match self {
            EffectiveDocument::Plain(map) => Value::Object(map),
            EffectiveDocument::Traced(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, LookupEntry(value, path))| {
                        (key, Value::Array(vec![value, Value::String(path)]))
                    })
                    .collect(),
            ),
        }
    }
}

/// Computes effective documents from stored resource values rows.
///
/// Stateless; one instance can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct EffectiveValueCalculator {}

impl EffectiveValueCalculator {
    pub fn new() -> Self {
        Self {}
    }

    /// Merges `rows` along `chain`.
    ///
    /// `rows` may contain any rows of the resource in the environment; only
    /// the root row and the rows of the chain's level values contribute.
    ///
    /// # Errors
    ///
    /// `DocumentNotObject` if a contributing `values` or `overrides`
    /// document is not a JSON object.
    pub fn compute(
        &self,
        chain: &[ResolvedLevel],
        rows: &[ResourceValues],
        trace: bool,
    ) -> HieraResult<EffectiveDocument> {
        let index: HashMap<Option<i64>, &ResourceValues> =
            rows.iter().map(|row| (row.level_value_id, row)).collect();
        debug!(index_size = index.len(), "Indexed resource values");

        let mut merged: BTreeMap<String, LookupEntry> = BTreeMap::new();
        let mut lookup_path = ROOT_LOOKUP_PATH.to_string();
        overlay_scope(&mut merged, index.get(&None).copied(), &lookup_path)?;

        for resolved in chain {
            lookup_path.push_str(&resolved.lookup_segment());
            overlay_scope(
                &mut merged,
                index.get(&Some(resolved.level_value.id)).copied(),
                &lookup_path,
            )?;
        }

        Ok(if trace {
            EffectiveDocument::Traced(merged)
        } else {
            EffectiveDocument::Plain(
                merged
                    .into_iter()
                    .map(|(key, LookupEntry(value, _))| (key, value))
                    .collect(),
            )
        })
    }
}

fn overlay_scope(
    merged: &mut BTreeMap<String, LookupEntry>,
    row: Option<&ResourceValues>,
    lookup_path: &str,
) -> HieraResult<()> {
    if let Some(row) = row {
        overlay(merged, row, DocumentKind::Values, lookup_path)?;
        overlay(merged, row, DocumentKind::Overrides, lookup_path)?;
    }
    Ok(())
}

fn overlay(
    merged: &mut BTreeMap<String, LookupEntry>,
    row: &ResourceValues,
    kind: DocumentKind,
    lookup_path: &str,
) -> HieraResult<()> {
    let Value::Object(map) = row.document(kind) else {
        return Err(HieraError::DocumentNotObject {
            document: kind.to_string(),
            lookup_path: lookup_path.to_string(),
            found: json_kind(row.document(kind)).to_string(),
        });
    };
    for (key, value) in map {
        merged.insert(
            key.clone(),
            LookupEntry(value.clone(), lookup_path.to_string()),
        );
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
