//! Level path resolution.
//!
//! An environment declares an ordered chain of hierarchy levels, e.g.
//! `region → cluster → node`. Callers address a point in that hierarchy
//! with an ordered list of `(level name, level value)` pairs. Resolution
//! validates the names against the chain and get-or-creates the level value
//! rows, producing one [`ResolvedLevel`] per requested pair.
//!
//! A shorter request than the chain is valid and addresses an intermediate
//! level. A longer request is rejected with `LevelsUnmatched`.

use crate::{
    errors::{HieraError, HieraResult},
    models::{Environment, HierarchyLevel, LevelPair, LevelValue},
    store::StoreTransaction,
};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "levels_tests.rs"]
mod tests;

/// A requested level matched to its hierarchy level and level value row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLevel {
    pub level: HierarchyLevel,
    pub level_value: LevelValue,
}

impl ResolvedLevel {
    /// Returns the lookup path segment `<level-name>/<level-value>/`.
    pub fn lookup_segment(&self) -> String {
        format!("{}/{}/", self.level.name, self.level_value.value)
    }
}

/// Orders the levels of one environment from the root down.
///
/// # Errors
///
/// Returns a `Store` error if the parent links don't form a single chain.
pub fn ordered_levels(levels: Vec<HierarchyLevel>) -> HieraResult<Vec<HierarchyLevel>> {
    let total = levels.len();
    let mut by_parent: HashMap<Option<i64>, HierarchyLevel> = HashMap::with_capacity(total);
    for level in levels {
        let parent_id = level.parent_id;
        if let Some(sibling) = by_parent.insert(parent_id, level) {
            return Err(HieraError::Store {
                reason: format!(
                    "Hierarchy levels of environment {} don't form a chain",
                    sibling.environment_id
                ),
            });
        }
    }

    let mut ordered = Vec::with_capacity(total);
    let mut parent_id = None;
    while let Some(level) = by_parent.remove(&parent_id) {
        parent_id = Some(level.id);
        ordered.push(level);
    }

    if let Some(orphan) = by_parent.values().next() {
        return Err(HieraError::Store {
            reason: format!(
                "Hierarchy levels of environment {} don't form a chain",
                orphan.environment_id
            ),
        });
    }
    Ok(ordered)
}

/// Loads the level chain of an environment in root-to-leaf order.
pub async fn environment_levels(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
) -> HieraResult<Vec<HierarchyLevel>> {
    let levels = tx.list_hierarchy_levels(environment_id).await?;
    ordered_levels(levels)
}

/// Maps requested level paths onto an environment's level chain.
#[derive(Debug, Clone, Default)]
pub struct LevelPathResolver {}

impl LevelPathResolver {
    pub fn new() -> Self {
        Self {}
    }

    /// Resolves `requested` against the levels of `environment`.
    ///
    /// Every name is validated before any level value is created, so a
    /// rejected request performs no writes. Level values are get-or-created
    /// inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// - `LevelNameMismatch` if the name at some position differs from the
    ///   declared level at that position
    /// - `LevelsUnmatched` if more pairs are requested than levels declared
    #[instrument(skip(self, tx, environment), fields(environment_id = environment.id, levels = requested.len()))]
    pub async fn resolve(
        &self,
        tx: &mut dyn StoreTransaction,
        environment: &Environment,
        requested: &[LevelPair],
    ) -> HieraResult<Vec<ResolvedLevel>> {
        let declared = environment_levels(tx, environment.id).await?;

        for (level, pair) in declared.iter().zip(requested) {
            if level.name != pair.name {
                return Err(HieraError::LevelNameMismatch {
                    expected: level.name.clone(),
                    actual: pair.name.clone(),
                });
            }
        }
        if requested.len() > declared.len() {
            return Err(HieraError::LevelsUnmatched {
                environment_id: environment.id,
                requested: requested.iter().map(|p| p.name.clone()).collect(),
                declared: declared.iter().map(|l| l.name.clone()).collect(),
            });
        }

        let mut resolved = Vec::with_capacity(requested.len());
        for (level, pair) in declared.into_iter().zip(requested) {
            let level_value = get_or_create_level_value(tx, level.id, &pair.value).await?;
            resolved.push(ResolvedLevel { level, level_value });
        }

        debug!(
            level_value_ids = ?resolved.iter().map(|r| r.level_value.id).collect::<Vec<_>>(),
            "Resolved level values"
        );
        Ok(resolved)
    }

    /// Resolves `requested` and returns only the deepest level value, or
    /// `None` for an empty request (the root scope).
    pub async fn resolve_leaf(
        &self,
        tx: &mut dyn StoreTransaction,
        environment: &Environment,
        requested: &[LevelPair],
    ) -> HieraResult<Option<LevelValue>> {
        let resolved = self.resolve(tx, environment, requested).await?;
        Ok(resolved.into_iter().last().map(|r| r.level_value))
    }
}

async fn get_or_create_level_value(
    tx: &mut dyn StoreTransaction,
    level_id: i64,
    value: &str,
) -> HieraResult<LevelValue> {
    if let Some(existing) = tx.find_level_value(level_id, value).await? {
        return Ok(existing);
    }
    tx.insert_level_value(level_id, value).await
}
