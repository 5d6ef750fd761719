//! Keyed partial updates of JSON documents.
//!
//! A key path is a list of JSON values addressing into a document: strings
//! address object keys, non-negative integers address list indices. For a
//! `set` the last element of the path is the value to assign; for a
//! `delete` every element is an address.
//!
//! ```text
//! set    [["a", "b", "v"]]  on {"a": {}}           -> {"a": {"b": "v"}}
//! set    [["a", 0, "b", 1]] on {"a": [{"b": 0}]}   -> {"a": [{"b": 1}]}
//! delete [["a", "b"]]       on {"a": {"b": "v"}}   -> {"a": {}}
//! ```
//!
//! Edits are copy-on-write: the editor works on a copy of the input and only
//! returns it once every path of the batch has been applied, so a failing
//! path leaves the caller's document untouched.
//!
//! Addressing rules shared by every operation:
//! - objects are addressed by string keys; an integer element addresses
//!   an object by its decimal string
//! - lists are addressed by index, or by a string element holding a
//!   non-negative integer (so dotted paths such as `a.0.b` can index lists)
//! - `set` never creates intermediate containers and never grows lists

use crate::errors::{HieraError, HieraResult};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[cfg(test)]
#[path = "key_paths_tests.rs"]
mod tests;

/// Delimiter of key paths passed as a single string, e.g. in a `key` query.
pub const KEYS_PATH_DELIMITER: char = '.';

/// Operation applied to every key path of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysOperation {
    Set,
    Delete,
}

impl KeysOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeysOperation::Set => "set",
            KeysOperation::Delete => "delete",
        }
    }
}

impl FromStr for KeysOperation {
    type Err = HieraError;

    fn from_str(operation: &str) -> Result<Self, Self::Err> {
        match operation {
            "set" => Ok(KeysOperation::Set),
            "delete" => Ok(KeysOperation::Delete),
            other => Err(HieraError::UnknownOperation {
                operation: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for KeysOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One addressing element of a key path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathKey {
    Field(String),
    Index(usize),
}

impl PathKey {
    fn from_value(value: &Value, path: &str) -> HieraResult<Self> {
        match value {
            Value::String(key) => Ok(PathKey::Field(key.clone())),
            Value::Number(number) => number
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(PathKey::Index)
                .ok_or_else(|| invalid_key(value, path)),
            _ => Err(invalid_key(value, path)),
        }
    }

    fn as_field(&self) -> String {
        match self {
            PathKey::Field(key) => key.clone(),
            PathKey::Index(index) => index.to_string(),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(index) => Some(*index),
            PathKey::Field(key) if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) => {
                key.parse().ok()
            }
            PathKey::Field(_) => None,
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Field(key) => f.write_str(key),
            PathKey::Index(index) => write!(f, "{}", index),
        }
    }
}

fn render_path(path: &[Value]) -> String {
    Value::Array(path.to_vec()).to_string()
}

fn invalid_key(key: &Value, path: &str) -> HieraError {
    HieraError::InvalidPath {
        path: path.to_string(),
        reason: format!(
            "Key {} is neither a string nor a non-negative integer",
            key
        ),
    }
}

fn not_found(key: &PathKey, path: &str) -> HieraError {
    HieraError::PathNotFound {
        path: path.to_string(),
        key: key.to_string(),
    }
}

fn unreachable(leaf: &Value, key: &PathKey, path: &str) -> HieraError {
    HieraError::PathUnreachable {
        path: path.to_string(),
        key: key.to_string(),
        leaf: leaf.to_string(),
    }
}

fn parse_keys(raw: &[Value], path: &str) -> HieraResult<Vec<PathKey>> {
    raw.iter().map(|key| PathKey::from_value(key, path)).collect()
}

fn child<'a>(current: &'a Value, key: &PathKey, path: &str) -> HieraResult<&'a Value> {
    match current {
        Value::Object(map) => map.get(&key.as_field()).ok_or_else(|| not_found(key, path)),
        Value::Array(items) => key
            .as_index()
            .and_then(|index| items.get(index))
            .ok_or_else(|| not_found(key, path)),
        leaf => Err(unreachable(leaf, key, path)),
    }
}

fn child_mut<'a>(current: &'a mut Value, key: &PathKey, path: &str) -> HieraResult<&'a mut Value> {
    match current {
        Value::Object(map) => map
            .get_mut(&key.as_field())
            .ok_or_else(|| not_found(key, path)),
        Value::Array(items) => match key.as_index() {
            Some(index) => items.get_mut(index).ok_or_else(|| not_found(key, path)),
            None => Err(not_found(key, path)),
        },
        leaf => Err(unreachable(leaf, key, path)),
    }
}

/// Splits a delimited key path such as `a.0.b` into path elements.
pub fn split_key_path(key: &str) -> Vec<Value> {
    key.split(KEYS_PATH_DELIMITER)
        .map(|part| Value::String(part.to_string()))
        .collect()
}

/// Applies batches of key-path edits to JSON documents.
///
/// Stateless; one instance can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct KeyPathEditor {}

impl KeyPathEditor {
    pub fn new() -> Self {
        Self {}
    }

    /// Parses `operation` and applies the batch; see [`KeyPathEditor::apply`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if `operation` is neither `set` nor
    /// `delete`, before touching the document.
    pub fn perform(
        &self,
        operation: &str,
        document: &Value,
        key_paths: &[Vec<Value>],
    ) -> HieraResult<Value> {
        let operation = operation.parse::<KeysOperation>()?;
        self.apply(operation, document, key_paths)
    }

    /// Applies every key path of the batch to a copy of `document`.
    ///
    /// Returns the edited copy. The input is never modified; if any path
    /// fails the whole batch fails.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if a path is shorter than the operation requires
    ///   (two elements for `set`, one for `delete`) or holds an element
    ///   that is neither a string nor a non-negative integer
    /// - `PathNotFound` if an addressed key or index does not exist
    /// - `PathUnreachable` if a path continues past a leaf value
    pub fn apply(
        &self,
        operation: KeysOperation,
        document: &Value,
        key_paths: &[Vec<Value>],
    ) -> HieraResult<Value> {
        debug!(
            operation = %operation,
            paths = key_paths.len(),
            "Applying keys operation"
        );
        let mut working = document.clone();
        for key_path in key_paths {
            match operation {
                KeysOperation::Set => set_path(&mut working, key_path)?,
                KeysOperation::Delete => delete_path(&mut working, key_path)?,
            }
        }
        Ok(working)
    }

    /// Returns a copy of the value addressed by `key_path`.
    ///
    /// An empty path addresses the whole document.
    pub fn get(&self, document: &Value, key_path: &[Value]) -> HieraResult<Value> {
        let path = render_path(key_path);
        let keys = parse_keys(key_path, &path)?;
        let mut current = document;
        for key in &keys {
            current = child(current, key, &path)?;
        }
        Ok(current.clone())
    }
}

fn invalid_set_path(path: String) -> HieraError {
    HieraError::InvalidPath {
        path,
        reason: "Keys path should contain at least one key and value".to_string(),
    }
}

fn set_path(document: &mut Value, key_path: &[Value]) -> HieraResult<()> {
    let path = render_path(key_path);
    let Some((value, address)) = key_path.split_last() else {
        return Err(invalid_set_path(path));
    };
    let keys = parse_keys(address, &path)?;
    let Some((assign_to, walk)) = keys.split_last() else {
        return Err(invalid_set_path(path));
    };

    let mut current = document;
    for key in walk {
        current = child_mut(current, key, &path)?;
    }

    match current {
        Value::Object(map) => {
            map.insert(assign_to.as_field(), value.clone());
            Ok(())
        }
        Value::Array(items) => {
            let slot = assign_to
                .as_index()
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| not_found(assign_to, &path))?;
            *slot = value.clone();
            Ok(())
        }
        leaf => Err(unreachable(leaf, assign_to, &path)),
    }
}

fn delete_path(document: &mut Value, key_path: &[Value]) -> HieraResult<()> {
    let path = render_path(key_path);
    let keys = parse_keys(key_path, &path)?;
    let (remove, walk) = match keys.split_last() {
        Some(split) => split,
        None => {
            return Err(HieraError::InvalidPath {
                path,
                reason: "Keys path should contain at least one key".to_string(),
            })
        }
    };

    let mut current = document;
    for key in walk {
        current = child_mut(current, key, &path)?;
    }

    match current {
        Value::Object(map) => map
            .remove(&remove.as_field())
            .map(|_| ())
            .ok_or_else(|| not_found(remove, &path)),
        Value::Array(items) => match remove.as_index() {
            Some(index) if index < items.len() => {
                items.remove(index);
                Ok(())
            }
            _ => Err(not_found(remove, &path)),
        },
        leaf => Err(unreachable(leaf, remove, &path)),
    }
}
