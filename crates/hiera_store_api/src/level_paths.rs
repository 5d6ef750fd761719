//! Route grammar below `/environments/:environment_id/`.
//!
//! Resource URLs embed a variable-length level path:
//!
//! ```text
//! hierarchy_levels
//! hierarchy_levels/<name>
//! {<level>/<value>/}*resources/<id-or-name>/(values|overrides)
//! {<level>/<value>/}*resources/<id-or-name>/(values|overrides)/keys/<operation>
//! ```
//!
//! Segments are matched from the end so level names and values may be any
//! non-empty segment, including `resources` or `keys`.

use hiera_store::{DocumentKind, Identifier, LevelPair};

#[cfg(test)]
#[path = "level_paths_tests.rs"]
mod tests;

const RESOURCES: &str = "resources";
const KEYS: &str = "keys";
const HIERARCHY_LEVELS: &str = "hierarchy_levels";

/// A parsed environment sub-path.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentPath {
    HierarchyLevels,
    HierarchyLevel(String),
    Resource(ResourcePath),
}

/// Address of a resource document at a level path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePath {
    pub levels: Vec<LevelPair>,
    pub resource: Identifier,
    /// The resource segment as written in the URL.
    pub resource_segment: String,
    pub document: DocumentKind,
    /// Operation of a `keys/<operation>` URL.
    pub keys_operation: Option<String>,
}

impl ResourcePath {
    /// Number of trailing segments after the level path, starting with
    /// `resources`.
    pub fn tail_len(&self) -> usize {
        if self.keys_operation.is_some() {
            5
        } else {
            3
        }
    }

    /// Whether the URL addresses the resource by its id as the id prints,
    /// so `5` is canonical while `05` and `resdef1` are not.
    pub fn is_canonical(&self) -> bool {
        match self.resource.as_id() {
            Some(id) => self.resource_segment == id.to_string(),
            None => false,
        }
    }
}

/// Parses the part of the URL path after `/environments/:environment_id/`.
///
/// Returns `None` when the path matches no known shape.
pub fn parse_environment_path(rest: &str) -> Option<EnvironmentPath> {
    let segments: Vec<&str> = rest.trim_matches('/').split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    match segments.as_slice() {
        [HIERARCHY_LEVELS] => return Some(EnvironmentPath::HierarchyLevels),
        [HIERARCHY_LEVELS, name] => return Some(EnvironmentPath::HierarchyLevel(name.to_string())),
        _ => {}
    }

    parse_resource(&segments, true)
        .or_else(|| parse_resource(&segments, false))
        .map(EnvironmentPath::Resource)
}

fn parse_resource(segments: &[&str], with_keys: bool) -> Option<ResourcePath> {
    let tail_len = if with_keys { 5 } else { 3 };
    let split = segments.len().checked_sub(tail_len)?;
    let (prefix, tail) = segments.split_at(split);

    let keys_operation = match (with_keys, tail) {
        (true, [RESOURCES, _, _, KEYS, operation]) => Some(operation.to_string()),
        (false, [RESOURCES, _, _]) => None,
        _ => return None,
    };
    let document = parse_document(tail[2])?;
    let levels = parse_levels(prefix)?;

    Some(ResourcePath {
        levels,
        resource: Identifier::parse(tail[1]),
        resource_segment: tail[1].to_string(),
        document,
        keys_operation,
    })
}

fn parse_document(segment: &str) -> Option<DocumentKind> {
    match segment {
        "values" => Some(DocumentKind::Values),
        "overrides" => Some(DocumentKind::Overrides),
        _ => None,
    }
}

fn parse_levels(prefix: &[&str]) -> Option<Vec<LevelPair>> {
    if prefix.len() % 2 != 0 {
        return None;
    }
    Some(
        prefix
            .chunks(2)
            .map(|pair| LevelPair::new(pair[0], pair[1]))
            .collect(),
    )
}

/// Rewrites the resource segment of a request path to `resource_id`,
/// keeping the query string.
///
/// `original_path` is the full path as received, so a configured route
/// prefix is preserved.
pub fn canonical_location(
    original_path: &str,
    query: Option<&str>,
    resource: &ResourcePath,
    resource_id: i64,
) -> Option<String> {
    let trimmed = original_path.trim_end_matches('/');
    let mut segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    let index = segments.len().checked_sub(resource.tail_len())? + 1;
    *segments.get_mut(index)? = resource_id.to_string();

    let mut location = segments.join("/");
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(query);
    }
    Some(location)
}
