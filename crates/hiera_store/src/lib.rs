//! # Hiera Store
//!
//! Core of a hierarchical configuration store. Configuration values for a
//! resource are stored per environment at points of the environment's level
//! hierarchy and read back either as stored or as the effective value merged
//! from the root down.
//!
//! ## Overview
//!
//! - **Components** group **resource definitions**.
//! - An **environment** activates a set of components and declares an ordered
//!   chain of **hierarchy levels**, e.g. `region → cluster → node`.
//! - A **level path** such as `[("region", "us-east"), ("cluster", "c1")]`
//!   addresses a point in that hierarchy; its level values are created on
//!   first use.
//! - At each point a resource owns two JSON documents: `values` and
//!   `overrides`. Overrides win over values at the same point; deeper points
//!   win over shallower ones.
//!
//! ## Main entry points
//!
//! - [`ResourceValuesService`] - read and write values and overrides,
//!   including effective reads with lookup tracing and key-path edits
//! - [`ComponentsService`], [`ResourceDefinitionsService`],
//!   [`EnvironmentsService`] - administration of the schema entities
//! - [`KeyPathEditor`], [`LevelPathResolver`], [`EffectiveValueCalculator`] -
//!   the algorithms the services are built from
//!
//! ## Storage
//!
//! All services talk to storage through the [`ConfigStore`] and
//! [`StoreTransaction`] traits. Each operation runs in exactly one
//! transaction that is committed only when the operation succeeds.
//! [`SqlStore`] implements them over SQLite, either file-backed or in memory.
//!
//! ## Examples
//!
//! ```no_run
//! use hiera_store::{
//!     DocumentKind, Identifier, LevelPair, ResourceValuesService, SqlStore, ValuesQuery,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), hiera_store::HieraError> {
//! let store = SqlStore::connect("sqlite://hiera_store.db").await?;
//! let service = ResourceValuesService::new(Arc::new(store));
//! let resource = Identifier::from("database");
//! let path = vec![LevelPair::new("region", "us-east")];
//!
//! service
//!     .put_document(1, &path, &resource, DocumentKind::Values, json!({"port": 5432}))
//!     .await?;
//!
//! let query = ValuesQuery { effective: true, show_lookup: true, key: None };
//! let merged = service.get_values(1, &path, &resource, &query).await?;
//! // {"port": [5432, "/region/us-east/"]}
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod effective;
pub mod environments;
pub mod errors;
pub mod key_paths;
pub mod levels;
pub mod models;
pub mod resource_definitions;
pub mod resource_values;
pub mod sql_store;
pub mod store;

#[cfg(test)]
mod test_fixtures;

pub use components::{
    ComponentUpdate, ComponentView, ComponentsService, InlineResourceDefinition, NewComponent,
    ResourceDefinitionRef,
};
pub use effective::{EffectiveDocument, EffectiveValueCalculator, LookupEntry, ROOT_LOOKUP_PATH};
pub use environments::{
    EnvironmentUpdate, EnvironmentView, EnvironmentsService, HierarchyLevelUpdate,
    HierarchyLevelView, NewEnvironment,
};
pub use errors::{HieraError, HieraResult};
pub use key_paths::{split_key_path, KeyPathEditor, KeysOperation, KEYS_PATH_DELIMITER};
pub use levels::{LevelPathResolver, ResolvedLevel};
pub use models::{
    Component, DocumentKind, Environment, HierarchyLevel, Identifier, LevelPair, LevelValue,
    ResourceDefinition, ResourceValues,
};
pub use resource_definitions::{
    ComponentFilter, NewResourceDefinition, ResourceDefinitionUpdate, ResourceDefinitionsService,
};
pub use resource_values::{ResourceValuesService, ValuesQuery};
pub use sql_store::SqlStore;
pub use store::{ConfigStore, StoreTransaction};
