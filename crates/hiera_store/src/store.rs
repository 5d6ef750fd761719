//! Transactional relational store interface.
//!
//! The core never talks to a database directly. Every request opens one
//! [`StoreTransaction`] through a [`ConfigStore`], performs all of its reads
//! and writes through it, and commits once at the end. Dropping a
//! transaction without calling [`StoreTransaction::commit`] discards every
//! change made through it, including level values created while resolving a
//! level path.
//!
//! Implementations enforce the unique constraints of the schema and report
//! violations as [`HieraError::IntegrityConflict`]:
//!
//! - component name
//! - environment id
//! - `(level_id, value)` for level values
//! - `(environment_id, resource_definition_id, level_value_id)` for
//!   resource values rows
//!
//! Deletes cascade the way the foreign keys of the schema do: component →
//! resource definitions → resource values rows; environment → hierarchy
//! levels → level values → resource values rows.
//!
//! [`HieraError::IntegrityConflict`]: crate::errors::HieraError::IntegrityConflict

use crate::{
    errors::HieraResult,
    models::{Component, Environment, HierarchyLevel, LevelValue, ResourceDefinition, ResourceValues},
};
use async_trait::async_trait;
use serde_json::Value;

/// Entry point to a transactional store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Opens a new transaction.
    ///
    /// Implementations must provide at least read-committed isolation so
    /// that concurrent writers to the same row cannot interleave.
    async fn begin(&self) -> HieraResult<Box<dyn StoreTransaction>>;
}

/// One unit of work against the store.
#[async_trait]
pub trait StoreTransaction: Send {
    // ---------------------------------------------------------------- components

    /// Inserts a component. Fails with a conflict if the name is taken.
    async fn insert_component(&mut self, name: &str) -> HieraResult<Component>;

    async fn get_component(&mut self, id: i64) -> HieraResult<Option<Component>>;

    async fn find_component_by_name(&mut self, name: &str) -> HieraResult<Option<Component>>;

    /// Lists all components ordered by id.
    async fn list_components(&mut self) -> HieraResult<Vec<Component>>;

    async fn update_component(&mut self, component: &Component) -> HieraResult<()>;

    /// Deletes a component and cascades to its resource definitions.
    ///
    /// Returns `false` if the component did not exist.
    async fn delete_component(&mut self, id: i64) -> HieraResult<bool>;

    // ------------------------------------------------------ resource definitions

    async fn insert_resource_definition(
        &mut self,
        name: &str,
        component_id: Option<i64>,
        content: Value,
    ) -> HieraResult<ResourceDefinition>;

    async fn get_resource_definition(&mut self, id: i64) -> HieraResult<Option<ResourceDefinition>>;

    /// Lists all resource definitions ordered by id.
    async fn list_resource_definitions(&mut self) -> HieraResult<Vec<ResourceDefinition>>;

    async fn update_resource_definition(&mut self, definition: &ResourceDefinition) -> HieraResult<()>;

    /// Deletes a resource definition and cascades to its resource values rows.
    async fn delete_resource_definition(&mut self, id: i64) -> HieraResult<bool>;

    // -------------------------------------------------------------- environments

    /// Inserts an environment, using `id` when supplied or allocating one.
    async fn insert_environment(
        &mut self,
        id: Option<i64>,
        components: &[i64],
    ) -> HieraResult<Environment>;

    async fn get_environment(&mut self, id: i64) -> HieraResult<Option<Environment>>;

    /// Lists all environments ordered by id.
    async fn list_environments(&mut self) -> HieraResult<Vec<Environment>>;

    async fn update_environment(&mut self, environment: &Environment) -> HieraResult<()>;

    /// Deletes an environment with its levels, level values and rows.
    async fn delete_environment(&mut self, id: i64) -> HieraResult<bool>;

    // ---------------------------------------------------------- hierarchy levels

    async fn insert_hierarchy_level(
        &mut self,
        environment_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> HieraResult<HierarchyLevel>;

    /// Lists the levels of one environment in no particular order.
    ///
    /// Use [`crate::levels::ordered_levels`] to obtain the chain order.
    async fn list_hierarchy_levels(&mut self, environment_id: i64) -> HieraResult<Vec<HierarchyLevel>>;

    async fn update_hierarchy_level(&mut self, level: &HierarchyLevel) -> HieraResult<()>;

    /// Deletes a level with its level values and their rows.
    ///
    /// Fails with a conflict while another level still names it as parent.
    async fn delete_hierarchy_level(&mut self, id: i64) -> HieraResult<bool>;

    // -------------------------------------------------------------- level values

    async fn find_level_value(&mut self, level_id: i64, value: &str) -> HieraResult<Option<LevelValue>>;

    /// Inserts a level value. Fails with a conflict if `(level_id, value)` exists.
    async fn insert_level_value(&mut self, level_id: i64, value: &str) -> HieraResult<LevelValue>;

    async fn get_level_value(&mut self, id: i64) -> HieraResult<Option<LevelValue>>;

    // ----------------------------------------------------------- resource values

    async fn find_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_id: Option<i64>,
    ) -> HieraResult<Option<ResourceValues>>;

    /// Inserts a row with empty `values` and `overrides` documents.
    async fn insert_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_id: Option<i64>,
    ) -> HieraResult<ResourceValues>;

    async fn update_resource_values(&mut self, row: &ResourceValues) -> HieraResult<()>;

    /// Loads, in one query, every row of the resource in the environment
    /// whose level value is either root or one of `level_value_ids`.
    async fn list_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_ids: &[i64],
    ) -> HieraResult<Vec<ResourceValues>>;

    /// Makes every change of this transaction durable.
    async fn commit(self: Box<Self>) -> HieraResult<()>;
}
