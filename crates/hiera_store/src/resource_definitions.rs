//! Resource definition administration.
//!
//! A resource definition names a configurable resource and carries a free
//! JSON `content` document describing it. Definitions usually belong to a
//! component; environments see the definitions of their active components.

use crate::{
    errors::{HieraError, HieraResult},
    key_paths::KeyPathEditor,
    models::ResourceDefinition,
    store::ConfigStore,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

#[cfg(test)]
#[path = "resource_definitions_tests.rs"]
mod tests;

/// Payload for creating a resource definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewResourceDefinition {
    pub name: String,
    #[serde(default)]
    pub component_id: Option<i64>,
    #[serde(default)]
    pub content: Option<Value>,
}

/// Partial update of a resource definition.
///
/// An absent field is left untouched; `"component_id": null` detaches the
/// definition from its component and `"content": null` clears the content.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceDefinitionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub component_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub content: Option<Value>,
}

// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Which definitions a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentFilter {
    #[default]
    All,
    /// Only definitions that belong to no component.
    Unassigned,
    Component(i64),
}

impl ComponentFilter {
    fn matches(&self, definition: &ResourceDefinition) -> bool {
        match self {
            ComponentFilter::All => true,
            ComponentFilter::Unassigned => definition.component_id.is_none(),
            ComponentFilter::Component(id) => definition.component_id == Some(*id),
        }
    }
}

#[derive(Clone)]
pub struct ResourceDefinitionsService {
    store: Arc<dyn ConfigStore>,
    editor: KeyPathEditor,
}

impl ResourceDefinitionsService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            editor: KeyPathEditor::new(),
        }
    }

    pub async fn list(&self, filter: ComponentFilter) -> HieraResult<Vec<ResourceDefinition>> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .list_resource_definitions()
            .await?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect())
    }

    pub async fn get(&self, id: i64) -> HieraResult<ResourceDefinition> {
        let mut tx = self.store.begin().await?;
        tx.get_resource_definition(id)
            .await?
            .ok_or_else(|| HieraError::not_found("resource_definitions", id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: NewResourceDefinition) -> HieraResult<ResourceDefinition> {
        let mut tx = self.store.begin().await?;
        let definition = tx
            .insert_resource_definition(
                &request.name,
                request.component_id,
                request.content.unwrap_or(Value::Null),
            )
            .await?;
        tx.commit().await?;

        info!(resource_definition_id = definition.id, "Created resource definition");
        Ok(definition)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i64, update: ResourceDefinitionUpdate) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let mut definition = tx
            .get_resource_definition(id)
            .await?
            .ok_or_else(|| HieraError::not_found("resource_definitions", id))?;

        if let Some(name) = update.name {
            definition.name = name;
        }
        if let Some(component_id) = update.component_id {
            definition.component_id = component_id;
        }
        if let Some(content) = update.content {
            definition.content = content;
        }
        tx.update_resource_definition(&definition).await?;
        tx.commit().await?;

        info!(resource_definition_id = id, "Updated resource definition");
        Ok(())
    }

    /// Deletes a definition and every value stored for it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_resource_definition(id).await? {
            return Err(HieraError::not_found("resource_definitions", id));
        }
        tx.commit().await?;

        info!(resource_definition_id = id, "Deleted resource definition");
        Ok(())
    }

    /// Applies a key-path batch to the definition's `content`.
    #[instrument(skip(self, key_paths), fields(paths = key_paths.len()))]
    pub async fn update_keys(
        &self,
        id: i64,
        operation: &str,
        key_paths: &[Vec<Value>],
    ) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let mut definition = tx
            .get_resource_definition(id)
            .await?
            .ok_or_else(|| HieraError::not_found("resource_definitions", id))?;

        definition.content = self
            .editor
            .perform(operation, &definition.content, key_paths)?;
        tx.update_resource_definition(&definition).await?;
        tx.commit().await?;

        info!(resource_definition_id = id, operation, "Updated resource definition content keys");
        Ok(())
    }
}
