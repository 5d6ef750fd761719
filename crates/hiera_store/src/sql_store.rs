//! SQLite implementation of the transactional store.
//!
//! [`SqlStore`] keeps the five tables of the data model in SQLite through a
//! `sqlx` connection pool. Each [`StoreTransaction`] wraps one
//! `sqlx::Transaction`; dropping it without committing rolls back.
//!
//! The schema enforces the store contract directly: `UNIQUE` constraints
//! back the conflict rules and `ON DELETE CASCADE` foreign keys implement
//! the cascades. Hierarchy level parents use a plain foreign key, so a level
//! that is still a parent can't be deleted on its own.
//!
//! File databases run in WAL mode so readers don't wait for an open writer.
//! An in-memory database (`sqlite::memory:`) lives on a single pooled
//! connection and transactions on it are serialized.

use crate::{
    errors::{HieraError, HieraResult},
    models::{Component, Environment, HierarchyLevel, LevelValue, ResourceDefinition, ResourceValues},
    store::{ConfigStore, StoreTransaction},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool, Transaction,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
#[path = "sql_store_tests.rs"]
mod tests;

/// Pool size for file databases.
const MAX_CONNECTIONS: u32 = 5;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS components (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS resource_definitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        component_id INTEGER REFERENCES components(id) ON DELETE CASCADE,
        content TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS environments (
        id INTEGER PRIMARY KEY AUTOINCREMENT
    )",
    "CREATE TABLE IF NOT EXISTS environment_components (
        environment_id INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
        component_id INTEGER NOT NULL REFERENCES components(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (environment_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS hierarchy_levels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        environment_id INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
        parent_id INTEGER REFERENCES hierarchy_levels(id)
    )",
    "CREATE TABLE IF NOT EXISTS level_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        level_id INTEGER NOT NULL REFERENCES hierarchy_levels(id) ON DELETE CASCADE,
        value TEXT NOT NULL,
        UNIQUE (level_id, value)
    )",
    "CREATE TABLE IF NOT EXISTS resource_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        environment_id INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
        resource_definition_id INTEGER NOT NULL
            REFERENCES resource_definitions(id) ON DELETE CASCADE,
        level_value_id INTEGER REFERENCES level_values(id) ON DELETE CASCADE,
        values_doc TEXT NOT NULL,
        overrides_doc TEXT NOT NULL
    )",
    // NULL level_value_id is the root scope and must be unique as well.
    "CREATE UNIQUE INDEX IF NOT EXISTS resource_values_scope
        ON resource_values (environment_id, resource_definition_id, IFNULL(level_value_id, 0))",
    "CREATE INDEX IF NOT EXISTS hierarchy_levels_environment
        ON hierarchy_levels (environment_id)",
];

/// SQLite-backed transactional store.
///
/// Cloning a `SqlStore` yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connects to the database at `url` and creates missing tables.
    ///
    /// `url` is a SQLite URL such as `sqlite://hiera_store.db` or
    /// `sqlite::memory:`. Missing database files are created.
    pub async fn connect(url: &str) -> HieraResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = if is_in_memory(url) {
            // Every connection to :memory: is a separate database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        let store = Self { pool };
        store.init_schema().await?;
        info!(in_memory = is_in_memory(url), "Connected to configuration database");
        Ok(store)
    }

    /// Opens a fresh in-memory database.
    pub async fn in_memory() -> HieraResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> HieraResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl ConfigStore for SqlStore {
    async fn begin(&self) -> HieraResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlTransaction { tx }))
    }
}

/// A transaction over a [`SqlStore`].
pub struct SqlTransaction {
    tx: Transaction<'static, Sqlite>,
}

fn decode_document(row: &SqliteRow, column: &str) -> HieraResult<Value> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(|e| HieraError::Store {
        reason: format!("Column {} holds invalid JSON: {}", column, e),
    })
}

fn component_from_row(row: &SqliteRow) -> HieraResult<Component> {
    Ok(Component {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

fn definition_from_row(row: &SqliteRow) -> HieraResult<ResourceDefinition> {
    Ok(ResourceDefinition {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        component_id: row.try_get("component_id")?,
        content: decode_document(row, "content")?,
    })
}

fn level_from_row(row: &SqliteRow) -> HieraResult<HierarchyLevel> {
    Ok(HierarchyLevel {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        environment_id: row.try_get("environment_id")?,
        parent_id: row.try_get("parent_id")?,
    })
}

fn level_value_from_row(row: &SqliteRow) -> HieraResult<LevelValue> {
    Ok(LevelValue {
        id: row.try_get("id")?,
        level_id: row.try_get("level_id")?,
        value: row.try_get("value")?,
    })
}

fn resource_values_from_row(row: &SqliteRow) -> HieraResult<ResourceValues> {
    Ok(ResourceValues {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        resource_definition_id: row.try_get("resource_definition_id")?,
        level_value_id: row.try_get("level_value_id")?,
        values: decode_document(row, "values_doc")?,
        overrides: decode_document(row, "overrides_doc")?,
    })
}

const RESOURCE_VALUES_COLUMNS: &str =
    "id, environment_id, resource_definition_id, level_value_id, values_doc, overrides_doc";

impl SqlTransaction {
    async fn exists(&mut self, sql: &str, id: i64) -> HieraResult<bool> {
        let row = sqlx::query(sql).bind(id).fetch_optional(&mut *self.tx).await?;
        Ok(row.is_some())
    }

    async fn component_exists(&mut self, id: i64) -> HieraResult<bool> {
        self.exists("SELECT 1 FROM components WHERE id = ?", id).await
    }

    async fn environment_exists(&mut self, id: i64) -> HieraResult<bool> {
        self.exists("SELECT 1 FROM environments WHERE id = ?", id).await
    }

    async fn level_exists(&mut self, id: i64) -> HieraResult<bool> {
        self.exists("SELECT 1 FROM hierarchy_levels WHERE id = ?", id).await
    }

    async fn first_missing_component(&mut self, components: &[i64]) -> HieraResult<Option<i64>> {
        for component_id in components {
            if !self.component_exists(*component_id).await? {
                return Ok(Some(*component_id));
            }
        }
        Ok(None)
    }

    async fn check_component_reference(
        &mut self,
        component_id: Option<i64>,
        definition_name: &str,
    ) -> HieraResult<()> {
        if let Some(component_id) = component_id {
            if !self.component_exists(component_id).await? {
                return Err(HieraError::conflict(format!(
                    "Component {} referenced by resource definition '{}' doesn't exist",
                    component_id, definition_name
                )));
            }
        }
        Ok(())
    }

    async fn environment_components(&mut self, environment_id: i64) -> HieraResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT component_id FROM environment_components
             WHERE environment_id = ? ORDER BY position",
        )
        .bind(environment_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("component_id").map_err(HieraError::from))
            .collect()
    }

    async fn write_environment_components(
        &mut self,
        environment_id: i64,
        components: &[i64],
    ) -> HieraResult<()> {
        sqlx::query("DELETE FROM environment_components WHERE environment_id = ?")
            .bind(environment_id)
            .execute(&mut *self.tx)
            .await?;
        for (position, component_id) in components.iter().enumerate() {
            sqlx::query(
                "INSERT INTO environment_components (environment_id, component_id, position)
                 VALUES (?, ?, ?)",
            )
            .bind(environment_id)
            .bind(*component_id)
            .bind(position as i64)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    async fn insert_component(&mut self, name: &str) -> HieraResult<Component> {
        if self.find_component_by_name(name).await?.is_some() {
            return Err(HieraError::conflict(format!(
                "Component with name '{}' already exists",
                name
            )));
        }
        let result = sqlx::query("INSERT INTO components (name) VALUES (?)")
            .bind(name)
            .execute(&mut *self.tx)
            .await?;
        Ok(Component {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn get_component(&mut self, id: i64) -> HieraResult<Option<Component>> {
        sqlx::query("SELECT id, name FROM components WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| component_from_row(&row))
            .transpose()
    }

    async fn find_component_by_name(&mut self, name: &str) -> HieraResult<Option<Component>> {
        sqlx::query("SELECT id, name FROM components WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| component_from_row(&row))
            .transpose()
    }

    async fn list_components(&mut self) -> HieraResult<Vec<Component>> {
        let rows = sqlx::query("SELECT id, name FROM components ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(component_from_row).collect()
    }

    async fn update_component(&mut self, component: &Component) -> HieraResult<()> {
        if let Some(existing) = self.find_component_by_name(&component.name).await? {
            if existing.id != component.id {
                return Err(HieraError::conflict(format!(
                    "Component with name '{}' already exists",
                    component.name
                )));
            }
        }
        let result = sqlx::query("UPDATE components SET name = ? WHERE id = ?")
            .bind(&component.name)
            .bind(component.id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HieraError::not_found("components", component.id));
        }
        Ok(())
    }

    async fn delete_component(&mut self, id: i64) -> HieraResult<bool> {
        let result = sqlx::query("DELETE FROM components WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_resource_definition(
        &mut self,
        name: &str,
        component_id: Option<i64>,
        content: Value,
    ) -> HieraResult<ResourceDefinition> {
        self.check_component_reference(component_id, name).await?;
        let result = sqlx::query(
            "INSERT INTO resource_definitions (name, component_id, content) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(component_id)
        .bind(content.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(ResourceDefinition {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            component_id,
            content,
        })
    }

    async fn get_resource_definition(&mut self, id: i64) -> HieraResult<Option<ResourceDefinition>> {
        sqlx::query(
            "SELECT id, name, component_id, content FROM resource_definitions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(|row| definition_from_row(&row))
        .transpose()
    }

    async fn list_resource_definitions(&mut self) -> HieraResult<Vec<ResourceDefinition>> {
        let rows = sqlx::query(
            "SELECT id, name, component_id, content FROM resource_definitions ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn update_resource_definition(&mut self, definition: &ResourceDefinition) -> HieraResult<()> {
        self.check_component_reference(definition.component_id, &definition.name)
            .await?;
        let result = sqlx::query(
            "UPDATE resource_definitions SET name = ?, component_id = ?, content = ? WHERE id = ?",
        )
        .bind(&definition.name)
        .bind(definition.component_id)
        .bind(definition.content.to_string())
        .bind(definition.id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HieraError::not_found("resource_definitions", definition.id));
        }
        Ok(())
    }

    async fn delete_resource_definition(&mut self, id: i64) -> HieraResult<bool> {
        let result = sqlx::query("DELETE FROM resource_definitions WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_environment(
        &mut self,
        id: Option<i64>,
        components: &[i64],
    ) -> HieraResult<Environment> {
        if let Some(missing) = self.first_missing_component(components).await? {
            return Err(HieraError::not_found("components", missing));
        }
        let id = match id {
            Some(id) => {
                if self.environment_exists(id).await? {
                    return Err(HieraError::conflict(format!(
                        "Environment with id {} already exists",
                        id
                    )));
                }
                sqlx::query("INSERT INTO environments (id) VALUES (?)")
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await?;
                id
            }
            None => sqlx::query("INSERT INTO environments DEFAULT VALUES")
                .execute(&mut *self.tx)
                .await?
                .last_insert_rowid(),
        };
        self.write_environment_components(id, components).await?;
        Ok(Environment {
            id,
            components: components.to_vec(),
        })
    }

    async fn get_environment(&mut self, id: i64) -> HieraResult<Option<Environment>> {
        if !self.environment_exists(id).await? {
            return Ok(None);
        }
        let components = self.environment_components(id).await?;
        Ok(Some(Environment { id, components }))
    }

    async fn list_environments(&mut self) -> HieraResult<Vec<Environment>> {
        let ids = sqlx::query("SELECT id FROM environments ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await?;
        let mut environments = BTreeMap::new();
        for row in &ids {
            let id: i64 = row.try_get("id")?;
            environments.insert(id, Vec::new());
        }

        let links = sqlx::query(
            "SELECT environment_id, component_id FROM environment_components
             ORDER BY environment_id, position",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        for row in &links {
            let environment_id: i64 = row.try_get("environment_id")?;
            if let Some(components) = environments.get_mut(&environment_id) {
                components.push(row.try_get("component_id")?);
            }
        }

        Ok(environments
            .into_iter()
            .map(|(id, components)| Environment { id, components })
            .collect())
    }

    async fn update_environment(&mut self, environment: &Environment) -> HieraResult<()> {
        if let Some(missing) = self.first_missing_component(&environment.components).await? {
            return Err(HieraError::not_found("components", missing));
        }
        if !self.environment_exists(environment.id).await? {
            return Err(HieraError::not_found("environments", environment.id));
        }
        self.write_environment_components(environment.id, &environment.components)
            .await
    }

    async fn delete_environment(&mut self, id: i64) -> HieraResult<bool> {
        let result = sqlx::query("DELETE FROM environments WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_hierarchy_level(
        &mut self,
        environment_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> HieraResult<HierarchyLevel> {
        if !self.environment_exists(environment_id).await? {
            return Err(HieraError::not_found("environments", environment_id));
        }
        if let Some(parent_id) = parent_id {
            if !self.level_exists(parent_id).await? {
                return Err(HieraError::not_found("environment_hierarchy_levels", parent_id));
            }
        }
        let result = sqlx::query(
            "INSERT INTO hierarchy_levels (name, environment_id, parent_id) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(environment_id)
        .bind(parent_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(HierarchyLevel {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            environment_id,
            parent_id,
        })
    }

    async fn list_hierarchy_levels(&mut self, environment_id: i64) -> HieraResult<Vec<HierarchyLevel>> {
        let rows = sqlx::query(
            "SELECT id, name, environment_id, parent_id FROM hierarchy_levels
             WHERE environment_id = ? ORDER BY id",
        )
        .bind(environment_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(level_from_row).collect()
    }

    async fn update_hierarchy_level(&mut self, level: &HierarchyLevel) -> HieraResult<()> {
        if let Some(parent_id) = level.parent_id {
            if parent_id == level.id || !self.level_exists(parent_id).await? {
                return Err(HieraError::conflict(format!(
                    "Hierarchy level '{}' can't reference parent {}",
                    level.name, parent_id
                )));
            }
        }
        let result = sqlx::query(
            "UPDATE hierarchy_levels SET name = ?, environment_id = ?, parent_id = ? WHERE id = ?",
        )
        .bind(&level.name)
        .bind(level.environment_id)
        .bind(level.parent_id)
        .bind(level.id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HieraError::not_found("environment_hierarchy_levels", level.id));
        }
        Ok(())
    }

    async fn delete_hierarchy_level(&mut self, id: i64) -> HieraResult<bool> {
        let child = sqlx::query("SELECT name FROM hierarchy_levels WHERE parent_id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        if let Some(child) = child {
            let child_name: String = child.try_get("name")?;
            return Err(HieraError::conflict(format!(
                "Hierarchy level {} is the parent of level '{}'",
                id, child_name
            )));
        }
        let result = sqlx::query("DELETE FROM hierarchy_levels WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        debug!(level_id = id, deleted = result.rows_affected(), "Deleted hierarchy level");
        Ok(result.rows_affected() > 0)
    }

    async fn find_level_value(&mut self, level_id: i64, value: &str) -> HieraResult<Option<LevelValue>> {
        sqlx::query("SELECT id, level_id, value FROM level_values WHERE level_id = ? AND value = ?")
            .bind(level_id)
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| level_value_from_row(&row))
            .transpose()
    }

    async fn insert_level_value(&mut self, level_id: i64, value: &str) -> HieraResult<LevelValue> {
        if !self.level_exists(level_id).await? {
            return Err(HieraError::not_found("environment_hierarchy_levels", level_id));
        }
        if self.find_level_value(level_id, value).await?.is_some() {
            return Err(HieraError::conflict(format!(
                "Level value '{}' already exists for level {}",
                value, level_id
            )));
        }
        let result = sqlx::query("INSERT INTO level_values (level_id, value) VALUES (?, ?)")
            .bind(level_id)
            .bind(value)
            .execute(&mut *self.tx)
            .await?;
        Ok(LevelValue {
            id: result.last_insert_rowid(),
            level_id,
            value: value.to_string(),
        })
    }

    async fn get_level_value(&mut self, id: i64) -> HieraResult<Option<LevelValue>> {
        sqlx::query("SELECT id, level_id, value FROM level_values WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| level_value_from_row(&row))
            .transpose()
    }

    async fn find_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_id: Option<i64>,
    ) -> HieraResult<Option<ResourceValues>> {
        let sql = format!(
            "SELECT {} FROM resource_values
             WHERE environment_id = ? AND resource_definition_id = ? AND level_value_id IS ?",
            RESOURCE_VALUES_COLUMNS
        );
        sqlx::query(&sql)
            .bind(environment_id)
            .bind(resource_definition_id)
            .bind(level_value_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| resource_values_from_row(&row))
            .transpose()
    }

    async fn insert_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_id: Option<i64>,
    ) -> HieraResult<ResourceValues> {
        if !self.environment_exists(environment_id).await? {
            return Err(HieraError::not_found("environments", environment_id));
        }
        if !self
            .exists("SELECT 1 FROM resource_definitions WHERE id = ?", resource_definition_id)
            .await?
        {
            return Err(HieraError::not_found(
                "resource_definitions",
                resource_definition_id,
            ));
        }
        if let Some(level_value_id) = level_value_id {
            let owner = sqlx::query(
                "SELECT hl.environment_id FROM level_values lv
                 JOIN hierarchy_levels hl ON hl.id = lv.level_id
                 WHERE lv.id = ?",
            )
            .bind(level_value_id)
            .fetch_optional(&mut *self.tx)
            .await?;
            let level_environment: Option<i64> =
                owner.map(|row| row.try_get("environment_id")).transpose()?;
            if level_environment != Some(environment_id) {
                return Err(HieraError::conflict(format!(
                    "Level value {} doesn't belong to environment {}",
                    level_value_id, environment_id
                )));
            }
        }
        if self
            .find_resource_values(environment_id, resource_definition_id, level_value_id)
            .await?
            .is_some()
        {
            return Err(HieraError::conflict(format!(
                "Resource values for resource {} already exist in environment {}",
                resource_definition_id, environment_id
            )));
        }

        let empty = json!({});
        let result = sqlx::query(
            "INSERT INTO resource_values
             (environment_id, resource_definition_id, level_value_id, values_doc, overrides_doc)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(environment_id)
        .bind(resource_definition_id)
        .bind(level_value_id)
        .bind(empty.to_string())
        .bind(empty.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(ResourceValues {
            id: result.last_insert_rowid(),
            environment_id,
            resource_definition_id,
            level_value_id,
            values: empty.clone(),
            overrides: empty,
        })
    }

    async fn update_resource_values(&mut self, row: &ResourceValues) -> HieraResult<()> {
        let result =
            sqlx::query("UPDATE resource_values SET values_doc = ?, overrides_doc = ? WHERE id = ?")
                .bind(row.values.to_string())
                .bind(row.overrides.to_string())
                .bind(row.id)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(HieraError::not_found("resource_values", row.id));
        }
        Ok(())
    }

    async fn list_resource_values(
        &mut self,
        environment_id: i64,
        resource_definition_id: i64,
        level_value_ids: &[i64],
    ) -> HieraResult<Vec<ResourceValues>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM resource_values WHERE environment_id = ",
            RESOURCE_VALUES_COLUMNS
        ));
        query
            .push_bind(environment_id)
            .push(" AND resource_definition_id = ")
            .push_bind(resource_definition_id)
            .push(" AND (level_value_id IS NULL");
        if !level_value_ids.is_empty() {
            query.push(" OR level_value_id IN (");
            let mut ids = query.separated(", ");
            for id in level_value_ids {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
        }
        query.push(")");

        let rows = query.build().fetch_all(&mut *self.tx).await?;
        rows.iter().map(resource_values_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> HieraResult<()> {
        let SqlTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
