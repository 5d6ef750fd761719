//! Shared fixtures for unit tests.

use crate::{
    models::{Component, Environment, HierarchyLevel, LevelPair, ResourceDefinition},
    sql_store::SqlStore,
    store::ConfigStore,
};
use serde_json::json;

/// A committed store holding one component with one resource definition
/// and environment 9 with the level chain `lvl1 → lvl2`.
pub(crate) struct Fixture {
    pub store: SqlStore,
    pub component: Component,
    pub definition: ResourceDefinition,
    pub environment: Environment,
    pub levels: Vec<HierarchyLevel>,
}

pub(crate) async fn fixture() -> Fixture {
    let store = SqlStore::in_memory().await.unwrap();
    let mut tx = store.begin().await.unwrap();
    let component = tx.insert_component("component1").await.unwrap();
    let definition = tx
        .insert_resource_definition("resdef1", Some(component.id), json!({"key": "nsname.key"}))
        .await
        .unwrap();
    let environment = tx
        .insert_environment(Some(9), &[component.id])
        .await
        .unwrap();
    let lvl1 = tx
        .insert_hierarchy_level(environment.id, "lvl1", None)
        .await
        .unwrap();
    let lvl2 = tx
        .insert_hierarchy_level(environment.id, "lvl2", Some(lvl1.id))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    Fixture {
        store,
        component,
        definition,
        environment,
        levels: vec![lvl1, lvl2],
    }
}

/// Builds level pairs from `(name, value)` tuples.
pub(crate) fn pairs(levels: &[(&str, &str)]) -> Vec<LevelPair> {
    levels
        .iter()
        .map(|(name, value)| LevelPair::new(*name, *value))
        .collect()
}
