//! Component administration.

use crate::{
    errors::{HieraError, HieraResult},
    models::{Component, ResourceDefinition},
    store::ConfigStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

#[cfg(test)]
#[path = "components_tests.rs"]
mod tests;

/// A resource definition created together with its component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlineResourceDefinition {
    pub name: String,
    #[serde(default)]
    pub content: Option<Value>,
}

/// Payload for creating a component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewComponent {
    pub name: String,
    #[serde(default)]
    pub resource_definitions: Vec<InlineResourceDefinition>,
}

/// Reference to an existing resource definition by id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceDefinitionRef {
    pub id: i64,
}

/// Partial update of a component.
///
/// When `resource_definitions` is present it becomes the complete list of
/// definitions owned by the component: listed definitions are moved to it,
/// previously owned ones that are not listed are detached.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ComponentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resource_definitions: Option<Vec<ResourceDefinitionRef>>,
}

/// A component with the resource definitions it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentView {
    pub id: i64,
    pub name: String,
    pub resource_definitions: Vec<ResourceDefinition>,
}

impl ComponentView {
    fn assemble(component: Component, definitions: &[ResourceDefinition]) -> Self {
        Self {
            resource_definitions: definitions
                .iter()
                .filter(|d| d.component_id == Some(component.id))
                .cloned()
                .collect(),
            id: component.id,
            name: component.name,
        }
    }
}

#[derive(Clone)]
pub struct ComponentsService {
    store: Arc<dyn ConfigStore>,
}

impl ComponentsService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> HieraResult<Vec<ComponentView>> {
        let mut tx = self.store.begin().await?;
        let definitions = tx.list_resource_definitions().await?;
        Ok(tx
            .list_components()
            .await?
            .into_iter()
            .map(|component| ComponentView::assemble(component, &definitions))
            .collect())
    }

    pub async fn get(&self, id: i64) -> HieraResult<ComponentView> {
        let mut tx = self.store.begin().await?;
        let component = tx
            .get_component(id)
            .await?
            .ok_or_else(|| HieraError::not_found("components", id))?;
        let definitions = tx.list_resource_definitions().await?;
        Ok(ComponentView::assemble(component, &definitions))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: NewComponent) -> HieraResult<ComponentView> {
        let mut tx = self.store.begin().await?;
        let component = tx.insert_component(&request.name).await?;

        let mut definitions = Vec::with_capacity(request.resource_definitions.len());
        for inline in request.resource_definitions {
            let definition = tx
                .insert_resource_definition(
                    &inline.name,
                    Some(component.id),
                    inline.content.unwrap_or(Value::Null),
                )
                .await?;
            definitions.push(definition);
        }
        tx.commit().await?;

        info!(
            component_id = component.id,
            resource_definitions = definitions.len(),
            "Created component"
        );
        Ok(ComponentView::assemble(component, &definitions))
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i64, update: ComponentUpdate) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let mut component = tx
            .get_component(id)
            .await?
            .ok_or_else(|| HieraError::not_found("components", id))?;

        if let Some(name) = update.name {
            component.name = name;
            tx.update_component(&component).await?;
        }

        if let Some(references) = update.resource_definitions {
            let mut owned = Vec::with_capacity(references.len());
            for reference in &references {
                let mut definition = tx
                    .get_resource_definition(reference.id)
                    .await?
                    .ok_or_else(|| HieraError::not_found("resource_definitions", reference.id))?;
                definition.component_id = Some(component.id);
                tx.update_resource_definition(&definition).await?;
                owned.push(definition.id);
            }

            let detached: Vec<ResourceDefinition> = tx
                .list_resource_definitions()
                .await?
                .into_iter()
                .filter(|d| d.component_id == Some(component.id) && !owned.contains(&d.id))
                .collect();
            for mut definition in detached {
                definition.component_id = None;
                tx.update_resource_definition(&definition).await?;
            }
        }
        tx.commit().await?;

        info!(component_id = id, "Updated component");
        Ok(())
    }

    /// Deletes a component together with its resource definitions and
    /// every value stored for them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_component(id).await? {
            return Err(HieraError::not_found("components", id));
        }
        tx.commit().await?;

        info!(component_id = id, "Deleted component");
        Ok(())
    }
}
