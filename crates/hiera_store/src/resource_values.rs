//! Resource values and overrides.
//!
//! Each `(environment, resource definition, level value)` combination owns
//! one row holding two independent documents, `values` and `overrides`.
//! Rows are created lazily on first write and only removed by cascade.
//!
//! [`ResourceValuesService`] runs every operation in one store transaction:
//! resolve the environment and resource definition, resolve the level path,
//! load or create the row(s), transform, persist, commit. Any error drops
//! the transaction, discarding level values created along the way.

use crate::{
    effective::EffectiveValueCalculator,
    environments::require_environment,
    errors::{HieraError, HieraResult},
    key_paths::{split_key_path, KeyPathEditor},
    levels::LevelPathResolver,
    models::{DocumentKind, Environment, Identifier, LevelPair, ResourceDefinition, ResourceValues},
    store::{ConfigStore, StoreTransaction},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[cfg(test)]
#[path = "resource_values_tests.rs"]
mod tests;

/// Finds the resource definition addressed by `identifier` among the
/// definitions of the environment's active components.
///
/// # Errors
///
/// - `NotFound` if no active component owns a matching definition
/// - `IntegrityConflict` if several definitions share the name
pub async fn find_resource_definition(
    tx: &mut dyn StoreTransaction,
    environment: &Environment,
    identifier: &Identifier,
) -> HieraResult<ResourceDefinition> {
    let mut matches: Vec<ResourceDefinition> = tx
        .list_resource_definitions()
        .await?
        .into_iter()
        .filter(|definition| {
            definition
                .component_id
                .map(|component_id| environment.components.contains(&component_id))
                .unwrap_or(false)
        })
        .filter(|definition| match identifier {
            Identifier::Id(id) => definition.id == *id,
            Identifier::Name(name) => definition.name == *name,
        })
        .collect();

    match matches.len() {
        0 => Err(HieraError::NotFound {
            entity: "resource_definitions".to_string(),
            identifier: format!("{} in environment {}", identifier, environment.id),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(HieraError::conflict(format!(
            "Found {} resource_definitions by {} in environment {}: {:?}",
            count,
            identifier,
            environment.id,
            matches.iter().map(|d| d.id).collect::<Vec<_>>()
        ))),
    }
}

/// Loads the row at `level_value_id`, if any.
pub async fn load_row(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
    resource_definition_id: i64,
    level_value_id: Option<i64>,
) -> HieraResult<Option<ResourceValues>> {
    tx.find_resource_values(environment_id, resource_definition_id, level_value_id)
        .await
}

/// Loads the row at `level_value_id`, creating an empty one if absent.
pub async fn get_or_create_row(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
    resource_definition_id: i64,
    level_value_id: Option<i64>,
) -> HieraResult<ResourceValues> {
    if let Some(row) = load_row(tx, environment_id, resource_definition_id, level_value_id).await? {
        return Ok(row);
    }
    debug!(
        environment_id,
        resource_definition_id,
        ?level_value_id,
        "Creating resource values row"
    );
    tx.insert_resource_values(environment_id, resource_definition_id, level_value_id)
        .await
}

/// Loads the root row and the rows of `level_value_ids` in one query.
pub async fn load_all_rows_for_resource(
    tx: &mut dyn StoreTransaction,
    environment_id: i64,
    resource_definition_id: i64,
    level_value_ids: &[i64],
) -> HieraResult<Vec<ResourceValues>> {
    tx.list_resource_values(environment_id, resource_definition_id, level_value_ids)
        .await
}

/// Options of a `values` read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuesQuery {
    /// Merge every scope from the root down instead of reading one row.
    pub effective: bool,
    /// Pair each effective key with the lookup path that provided it.
    pub show_lookup: bool,
    /// Delimited key path extracted from the result.
    pub key: Option<String>,
}

impl ValuesQuery {
    fn validate(&self) -> HieraResult<()> {
        if self.show_lookup && !self.effective {
            return Err(HieraError::validation(
                "Lookup path tracing can be done only for effective values",
            ));
        }
        Ok(())
    }
}

/// Transactional operations on resource values and overrides.
#[derive(Clone)]
pub struct ResourceValuesService {
    store: Arc<dyn ConfigStore>,
    resolver: LevelPathResolver,
    editor: KeyPathEditor,
    calculator: EffectiveValueCalculator,
}

impl ResourceValuesService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            resolver: LevelPathResolver::new(),
            editor: KeyPathEditor::new(),
            calculator: EffectiveValueCalculator::new(),
        }
    }

    /// Resolves a resource identifier within an environment.
    ///
    /// Boundary layers use this to redirect name-addressed requests to the
    /// canonical id-addressed location.
    #[instrument(skip(self), fields(resource = %identifier))]
    pub async fn resolve_resource(
        &self,
        environment_id: i64,
        identifier: &Identifier,
    ) -> HieraResult<ResourceDefinition> {
        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), environment_id).await?;
        find_resource_definition(tx.as_mut(), &environment, identifier).await
    }

    /// Replaces the whole document of `kind` at the level path.
    #[instrument(skip(self, levels, document), fields(resource = %identifier, levels = levels.len(), kind = %kind))]
    pub async fn put_document(
        &self,
        environment_id: i64,
        levels: &[LevelPair],
        identifier: &Identifier,
        kind: DocumentKind,
        document: Value,
    ) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), environment_id).await?;
        let definition = find_resource_definition(tx.as_mut(), &environment, identifier).await?;
        let level_value = self
            .resolver
            .resolve_leaf(tx.as_mut(), &environment, levels)
            .await?;

        let mut row = get_or_create_row(
            tx.as_mut(),
            environment.id,
            definition.id,
            level_value.map(|lv| lv.id),
        )
        .await?;
        row.set_document(kind, document);
        tx.update_resource_values(&row).await?;
        tx.commit().await?;

        info!(row_id = row.id, "Stored resource {}", kind);
        Ok(())
    }

    /// Reads the `values` document at the level path.
    ///
    /// A plain read returns the single row's `values` (or `{}`); an
    /// effective read merges every scope from the root down. The optional
    /// `key` is applied to the result in both modes.
    #[instrument(skip(self, levels), fields(resource = %identifier, levels = levels.len()))]
    pub async fn get_values(
        &self,
        environment_id: i64,
        levels: &[LevelPair],
        identifier: &Identifier,
        query: &ValuesQuery,
    ) -> HieraResult<Value> {
        query.validate()?;

        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), environment_id).await?;
        let definition = find_resource_definition(tx.as_mut(), &environment, identifier).await?;
        let chain = self
            .resolver
            .resolve(tx.as_mut(), &environment, levels)
            .await?;

        let result = if query.effective {
            let level_value_ids: Vec<i64> = chain.iter().map(|r| r.level_value.id).collect();
            let rows = load_all_rows_for_resource(
                tx.as_mut(),
                environment.id,
                definition.id,
                &level_value_ids,
            )
            .await?;
            debug!(rows = rows.len(), "Loaded resource values for effective merge");
            self.calculator
                .compute(&chain, &rows, query.show_lookup)?
                .into_json()
        } else {
            let level_value_id = chain.last().map(|r| r.level_value.id);
            load_row(tx.as_mut(), environment.id, definition.id, level_value_id)
                .await?
                .map(|row| row.values)
                .unwrap_or_else(|| json!({}))
        };
        tx.commit().await?;

        match &query.key {
            Some(key) => self.editor.get(&result, &split_key_path(key)),
            None => Ok(result),
        }
    }

    /// Reads the `overrides` document at the level path, or `{}`.
    #[instrument(skip(self, levels), fields(resource = %identifier, levels = levels.len()))]
    pub async fn get_overrides(
        &self,
        environment_id: i64,
        levels: &[LevelPair],
        identifier: &Identifier,
    ) -> HieraResult<Value> {
        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), environment_id).await?;
        let definition = find_resource_definition(tx.as_mut(), &environment, identifier).await?;
        let level_value = self
            .resolver
            .resolve_leaf(tx.as_mut(), &environment, levels)
            .await?;

        let overrides = load_row(
            tx.as_mut(),
            environment.id,
            definition.id,
            level_value.map(|lv| lv.id),
        )
        .await?
        .map(|row| row.overrides)
        .unwrap_or_else(|| json!({}));
        tx.commit().await?;
        Ok(overrides)
    }

    /// Applies a key-path batch to the document of `kind` at the level path.
    ///
    /// The stored document is only replaced once the whole batch applied.
    #[instrument(skip(self, levels, key_paths), fields(resource = %identifier, levels = levels.len(), kind = %kind))]
    pub async fn update_keys(
        &self,
        environment_id: i64,
        levels: &[LevelPair],
        identifier: &Identifier,
        kind: DocumentKind,
        operation: &str,
        key_paths: &[Vec<Value>],
    ) -> HieraResult<()> {
        let mut tx = self.store.begin().await?;
        let environment = require_environment(tx.as_mut(), environment_id).await?;
        let definition = find_resource_definition(tx.as_mut(), &environment, identifier).await?;
        let level_value = self
            .resolver
            .resolve_leaf(tx.as_mut(), &environment, levels)
            .await?;

        let mut row = get_or_create_row(
            tx.as_mut(),
            environment.id,
            definition.id,
            level_value.map(|lv| lv.id),
        )
        .await?;
        let edited = self
            .editor
            .perform(operation, row.document(kind), key_paths)?;
        row.set_document(kind, edited);
        tx.update_resource_values(&row).await?;
        tx.commit().await?;

        info!(row_id = row.id, operation, "Updated resource {} keys", kind);
        Ok(())
    }
}
