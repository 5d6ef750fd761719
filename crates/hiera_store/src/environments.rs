//! Environment and hierarchy level administration.
//!
//! An environment activates a set of components and declares an ordered
//! chain of hierarchy levels. Creating an environment creates its levels;
//! updating it re-links the chain, reusing levels whose names survive and
//! deleting (with their level values and stored rows) those that don't.

use crate::{
    errors::{HieraError, HieraResult},
    levels::environment_levels,
    models::{Component, Environment, HierarchyLevel, Identifier},
    store::{ConfigStore, StoreTransaction},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "environments_tests.rs"]
mod tests;

/// Loads an environment or fails with `NotFound`.
pub async fn require_environment(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
) -> HieraResult<Environment> {
    tx.get_environment(environment_id)
        .await?
        .ok_or_else(|| HieraError::not_found("environments", environment_id))
}

/// Payload for creating an environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewEnvironment {
    #[serde(default)]
    pub id: Option<i64>,
    pub components: Vec<Identifier>,
    #[serde(default)]
    pub hierarchy_levels: Vec<String>,
}

/// Partial update of an environment. Present lists replace the stored ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnvironmentUpdate {
    #[serde(default)]
    pub components: Option<Vec<Identifier>>,
    #[serde(default)]
    pub hierarchy_levels: Option<Vec<String>>,
}

/// An environment with its level names in chain order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentView {
    pub id: i64,
    pub components: Vec<i64>,
    pub hierarchy_levels: Vec<String>,
}

/// A hierarchy level with its parent referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyLevelView {
    pub name: String,
    pub environment_id: i64,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HierarchyLevelUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

async fn view(tx: &mut dyn StoreTransaction, environment: Environment) -> HieraResult<EnvironmentView> {
    let levels = environment_levels(tx, environment.id).await?;
    Ok(EnvironmentView {
        id: environment.id,
        components: environment.components,
        hierarchy_levels: levels.into_iter().map(|l| l.name).collect(),
    })
}

fn level_views(chain: &[HierarchyLevel]) -> Vec<HierarchyLevelView> {
    chain
        .iter()
        .enumerate()
        .map(|(position, level)| HierarchyLevelView {
            name: level.name.clone(),
            environment_id: level.environment_id,
            parent: position
                .checked_sub(1)
                .map(|parent| chain[parent].name.clone()),
        })
        .collect()
}

async fn load_components(
    tx: &mut dyn StoreTransaction,
    identifiers: &[Identifier],
) -> HieraResult<Vec<Component>> {
    let mut components = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let component = match identifier {
            Identifier::Id(id) => tx.get_component(*id).await?,
            Identifier::Name(name) => tx.find_component_by_name(name).await?,
        };
        components.push(component.ok_or_else(|| HieraError::not_found("components", identifier))?);
    }
    Ok(components)
}

/// Fails if the same component is referenced more than once, whether by
/// id or by name.
fn check_component_duplicates(components: &[Component]) -> HieraResult<()> {
    let mut identities = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for component in components {
        for identity in [Identifier::Id(component.id), Identifier::Name(component.name.clone())] {
            if !identities.insert(identity.clone()) {
                let rendered = identity.to_string();
                if !duplicates.contains(&rendered) {
                    duplicates.push(rendered);
                }
            }
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(HieraError::conflict(format!(
            "Components duplicates: {}",
            duplicates.join(", ")
        )))
    }
}

fn check_level_duplicates(names: &[String]) -> HieraResult<()> {
    let mut seen = HashSet::new();
    match names.iter().find(|name| !seen.insert(name.as_str())) {
        Some(duplicate) => Err(HieraError::validation(format!(
            "Hierarchy level '{}' is listed more than once",
            duplicate
        ))),
        None => Ok(()),
    }
}

#[derive(Clone)]
pub struct EnvironmentsService {
    store: Arc<dyn ConfigStore>,
}

impl EnvironmentsService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Lists every environment ordered by id.
    pub async fn list(&self) -> HieraResult<Vec<EnvironmentView>> {
        let mut tx = self.store.begin().await?;
        let environments = tx.list_environments().await?;
        let mut views = Vec::with_capacity(environments.len());
        for environment in environments {
            views.push(view(tx.as_mut(), environment).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, id: i64) -> HieraResult<EnvironmentView> {
        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), id).await?;
        view(tx.as_mut(), environment).await
    }

    /// Creates an environment with its components and level chain.
    ///
    /// Components may be referenced by id or name. Nothing is written if a
    /// component is missing or referenced twice.
    #[instrument(skip(self, request), fields(id = ?request.id, levels = request.hierarchy_levels.len()))]
    pub async fn create(&self, request: NewEnvironment) -> HieraResult<EnvironmentView> {
        check_level_duplicates(&request.hierarchy_levels)?;

        let mut tx = self.store.begin().await?;
        let components = load_components(tx.as_mut(), &request.components).await?;
        if let Err(e) = check_component_duplicates(&components) {
            warn!("Rejected environment: {}", e);
            return Err(e);
        }

        let component_ids: Vec<i64> = components.iter().map(|c| c.id).collect();
        let environment = tx.insert_environment(request.id, &component_ids).await?;

        let mut parent_id = None;
        for name in &request.hierarchy_levels {
            let level = tx
                .insert_hierarchy_level(environment.id, name, parent_id)
                .await?;
            parent_id = Some(level.id);
        }
        tx.commit().await?;

        info!(environment_id = environment.id, "Created environment");
        Ok(EnvironmentView {
            id: environment.id,
            components: environment.components,
            hierarchy_levels: request.hierarchy_levels,
        })
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i64, update: EnvironmentUpdate) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let mut environment = require_environment(tx.as_mut(), id).await?;

        if let Some(identifiers) = &update.components {
            let components = load_components(tx.as_mut(), identifiers).await?;
            check_component_duplicates(&components)?;
            environment.components = components.iter().map(|c| c.id).collect();
            tx.update_environment(&environment).await?;
        }

        if let Some(names) = &update.hierarchy_levels {
            check_level_duplicates(names)?;
            relink_levels(tx.as_mut(), environment.id, names).await?;
        }
        tx.commit().await?;

        info!(environment_id = id, "Updated environment");
        Ok(())
    }

    /// Deletes an environment with its levels, level values and rows.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_environment(id).await? {
            return Err(HieraError::not_found("environments", id));
        }
        tx.commit().await?;

        info!(environment_id = id, "Deleted environment");
        Ok(())
    }

    /// Lists the levels of an environment from the root down.
    pub async fn list_hierarchy_levels(&self, environment_id: i64) -> HieraResult<Vec<HierarchyLevelView>> {
        let mut tx = self.store.begin().await?;
        require_environment(tx.as_mut(), environment_id).await?;
        let chain = environment_levels(tx.as_mut(), environment_id).await?;
        Ok(level_views(&chain))
    }

    pub async fn get_hierarchy_level(
        &self,
        environment_id: i64,
        name: &str,
    ) -> HieraResult<HierarchyLevelView> {
        let mut tx = self.store.begin().await?;
        require_environment(tx.as_mut(), environment_id).await?;
        let chain = environment_levels(tx.as_mut(), environment_id).await?;
        level_views(&chain)
            .into_iter()
            .find(|level| level.name == name)
            .ok_or_else(|| level_not_found(environment_id, name))
    }

    /// Renames a level. Resource values stay attached to it.
    #[instrument(skip(self, update))]
    pub async fn update_hierarchy_level(
        &self,
        environment_id: i64,
        name: &str,
        update: HierarchyLevelUpdate,
    ) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let levels = tx.list_hierarchy_levels(environment_id).await?;
        let mut level = levels
            .iter()
            .find(|level| level.name == name)
            .cloned()
            .ok_or_else(|| level_not_found(environment_id, name))?;

        if let Some(new_name) = update.name {
            if levels.iter().any(|l| l.id != level.id && l.name == new_name) {
                return Err(HieraError::conflict(format!(
                    "Hierarchy level '{}' already exists in environment {}",
                    new_name, environment_id
                )));
            }
            level.name = new_name;
            tx.update_hierarchy_level(&level).await?;
        }
        tx.commit().await?;

        info!(environment_id, level = %level.name, "Updated hierarchy level");
        Ok(())
    }
}

fn level_not_found(environment_id: i64, name: &str) -> HieraError {
    HieraError::NotFound {
        entity: "environment_hierarchy_levels".to_string(),
        identifier: format!("{} in environment {}", name, environment_id),
    }
}

/// Rebuilds the level chain of an environment from `names`.
///
/// Levels whose name is listed are kept with their level values and rows;
/// listed names without a level are created; every other level is deleted
/// together with its level values and rows.
async fn relink_levels(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
    names: &[String],
) -> HieraResult<()> {
    let existing = tx.list_hierarchy_levels(environment_id).await?;

    let mut chain: Vec<HierarchyLevel> = Vec::with_capacity(names.len());
    for name in names {
        let level = match existing.iter().find(|l| &l.name == name) {
            Some(level) => level.clone(),
            None => tx.insert_hierarchy_level(environment_id, name, None).await?,
        };
        chain.push(level);
    }

    let mut parent_id = None;
    for level in chain.iter_mut() {
        level.parent_id = parent_id;
        tx.update_hierarchy_level(level).await?;
        parent_id = Some(level.id);
    }

    let kept: HashSet<i64> = chain.iter().map(|l| l.id).collect();
    let mut stale: Vec<HierarchyLevel> = existing
        .into_iter()
        .filter(|l| !kept.contains(&l.id))
        .collect();
    // Unlink first so stale levels don't block each other's deletion.
    for level in stale.iter_mut() {
        level.parent_id = None;
        tx.update_hierarchy_level(level).await?;
    }
    for level in &stale {
        tx.delete_hierarchy_level(level.id).await?;
    }

    debug!(
        environment_id,
        levels = chain.len(),
        removed = stale.len(),
        "Re-linked hierarchy levels"
    );
    Ok(())
}
