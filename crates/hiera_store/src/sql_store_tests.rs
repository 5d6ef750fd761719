//! Tests for the SQLite transactional store.

use super::*;
use serde_json::json;

/// Seeds one component with one resource definition and an environment
/// with a two-level chain, committing the result.
async fn seeded_store() -> (SqlStore, i64, i64, Vec<HierarchyLevel>) {
    let store = SqlStore::in_memory().await.unwrap();
    let mut tx = store.begin().await.unwrap();
    let component = tx.insert_component("component1").await.unwrap();
    let definition = tx
        .insert_resource_definition("resdef1", Some(component.id), json!({"key": "nsname.key"}))
        .await
        .unwrap();
    let environment = tx.insert_environment(Some(9), &[component.id]).await.unwrap();
    let lvl1 = tx
        .insert_hierarchy_level(environment.id, "lvl1", None)
        .await
        .unwrap();
    let lvl2 = tx
        .insert_hierarchy_level(environment.id, "lvl2", Some(lvl1.id))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    (store, environment.id, definition.id, vec![lvl1, lvl2])
}

#[tokio::test]
async fn uncommitted_transaction_is_rolled_back() {
    let store = SqlStore::in_memory().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_component("transient").await.unwrap();
    drop(tx);

    let mut tx = store.begin().await.unwrap();
    assert!(tx.list_components().await.unwrap().is_empty());
}

#[tokio::test]
async fn committed_changes_are_visible_to_later_transactions() {
    let (store, env_id, _, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_environment(env_id).await.unwrap().is_some());
    assert_eq!(tx.list_hierarchy_levels(env_id).await.unwrap().len(), levels.len());
}

#[tokio::test]
async fn duplicate_component_name_is_a_conflict() {
    let (store, _, _, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_component("component1").await.unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn preserved_environment_id_collision_is_a_conflict() {
    let (store, env_id, _, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_environment(Some(env_id), &[]).await.unwrap_err();

    assert_eq!(
        err,
        HieraError::conflict("Environment with id 9 already exists")
    );
}

#[tokio::test]
async fn allocated_environment_ids_skip_preserved_ids() {
    let (store, _, _, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let environment = tx.insert_environment(None, &[]).await.unwrap();

    assert_eq!(environment.id, 10);
}

#[tokio::test]
async fn duplicate_level_value_is_a_conflict() {
    let (store, _, _, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_level_value(levels[0].id, "val1").await.unwrap();
    let err = tx.insert_level_value(levels[0].id, "val1").await.unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn duplicate_resource_values_row_is_a_conflict() {
    let (store, env_id, def_id, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    let err = tx
        .insert_resource_values(env_id, def_id, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn resource_values_row_rejects_level_value_of_other_environment() {
    let (store, _, def_id, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let other = tx.insert_environment(None, &[]).await.unwrap();
    let level_value = tx.insert_level_value(levels[0].id, "val1").await.unwrap();
    let err = tx
        .insert_resource_values(other.id, def_id, Some(level_value.id))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn list_resource_values_filters_by_level_value_ids_and_root() {
    let (store, env_id, def_id, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let val1 = tx.insert_level_value(levels[0].id, "val1").await.unwrap();
    let other = tx.insert_level_value(levels[0].id, "other").await.unwrap();
    tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    tx.insert_resource_values(env_id, def_id, Some(val1.id))
        .await
        .unwrap();
    tx.insert_resource_values(env_id, def_id, Some(other.id))
        .await
        .unwrap();

    let rows = tx
        .list_resource_values(env_id, def_id, &[val1.id])
        .await
        .unwrap();

    let mut level_value_ids: Vec<Option<i64>> = rows.iter().map(|r| r.level_value_id).collect();
    level_value_ids.sort();
    assert_eq!(level_value_ids, vec![None, Some(val1.id)]);
}

#[tokio::test]
async fn deleting_environment_cascades_to_levels_values_and_rows() {
    let (store, env_id, def_id, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let val1 = tx.insert_level_value(levels[0].id, "val1").await.unwrap();
    tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    tx.insert_resource_values(env_id, def_id, Some(val1.id))
        .await
        .unwrap();
    assert!(tx.delete_environment(env_id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_environment(env_id).await.unwrap().is_none());
    assert!(tx.list_hierarchy_levels(env_id).await.unwrap().is_empty());
    assert!(tx.get_level_value(val1.id).await.unwrap().is_none());
    assert!(tx
        .list_resource_values(env_id, def_id, &[val1.id])
        .await
        .unwrap()
        .is_empty());
    assert!(tx.get_resource_definition(def_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_component_cascades_to_definitions_and_rows() {
    let (store, env_id, def_id, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    let component_id = tx
        .get_resource_definition(def_id)
        .await
        .unwrap()
        .and_then(|d| d.component_id)
        .unwrap();
    assert!(tx.delete_component(component_id).await.unwrap());

    assert!(tx.get_resource_definition(def_id).await.unwrap().is_none());
    assert!(tx
        .find_resource_values(env_id, def_id, None)
        .await
        .unwrap()
        .is_none());
    let environment = tx.get_environment(env_id).await.unwrap().unwrap();
    assert!(environment.components.is_empty());
}

#[tokio::test]
async fn deleting_a_parent_level_is_rejected() {
    let (store, _, _, levels) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let err = tx.delete_hierarchy_level(levels[0].id).await.unwrap_err();
    assert_eq!(err.kind(), "IntegrityConflict");

    assert!(tx.delete_hierarchy_level(levels[1].id).await.unwrap());
    assert!(tx.delete_hierarchy_level(levels[0].id).await.unwrap());
}

#[tokio::test]
async fn resource_definition_with_unknown_component_is_rejected() {
    let store = SqlStore::in_memory().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_resource_definition("orphan", Some(42), json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
    assert!(tx
        .insert_resource_definition("free", None, Value::Null)
        .await
        .is_ok());
}

#[tokio::test]
async fn in_memory_transactions_are_serialized() {
    let store = SqlStore::in_memory().await.unwrap();

    let mut first = store.begin().await.unwrap();
    let second_store = store.clone();
    let waiter = tokio::spawn(async move {
        let mut tx = second_store.begin().await.unwrap();
        tx.list_components().await.unwrap().len()
    });

    first.insert_component("component1").await.unwrap();
    first.commit().await.unwrap();

    assert_eq!(waiter.await.unwrap(), 1);
}

#[tokio::test]
async fn readers_do_not_wait_for_an_open_writer() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("hiera.db").display());
    let store = SqlStore::connect(&url).await.unwrap();

    let mut writer = store.begin().await.unwrap();
    writer.insert_component("component1").await.unwrap();

    let mut reader = store.begin().await.unwrap();
    assert!(reader.list_components().await.unwrap().is_empty());
    drop(reader);

    writer.commit().await.unwrap();

    let mut reader = store.begin().await.unwrap();
    assert_eq!(reader.list_components().await.unwrap().len(), 1);
}

#[tokio::test]
async fn data_survives_reconnecting_to_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("hiera.db").display());

    let store = SqlStore::connect(&url).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.insert_component("component1").await.unwrap();
    tx.insert_environment(Some(9), &[]).await.unwrap();
    tx.commit().await.unwrap();
    drop(store);

    let store = SqlStore::connect(&url).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_component_by_name("component1").await.unwrap().is_some());
    assert_eq!(tx.insert_environment(None, &[]).await.unwrap().id, 10);
}

#[tokio::test]
async fn documents_round_trip_through_storage() {
    let (store, env_id, def_id, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    let mut row = tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    row.values = json!({"a": {"b": [1, 2.5, null, "x"]}});
    row.overrides = json!({"flag": true});
    tx.update_resource_values(&row).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let stored = tx
        .find_resource_values(env_id, def_id, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, row);
}

#[tokio::test]
async fn environment_components_keep_their_order() {
    let store = SqlStore::in_memory().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let a = tx.insert_component("a").await.unwrap();
    let b = tx.insert_component("b").await.unwrap();
    let environment = tx.insert_environment(None, &[b.id, a.id]).await.unwrap();
    tx.update_environment(&Environment {
        id: environment.id,
        components: vec![a.id, b.id],
    })
    .await
    .unwrap();

    let stored = tx.get_environment(environment.id).await.unwrap().unwrap();
    assert_eq!(stored.components, vec![a.id, b.id]);
    assert_eq!(tx.list_environments().await.unwrap(), vec![stored]);
}

#[tokio::test]
async fn unique_violation_from_the_database_is_a_conflict() {
    let (store, env_id, def_id, _) = seeded_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_resource_values(env_id, def_id, None).await.unwrap();
    tx.commit().await.unwrap();

    let err: HieraError = sqlx::query(
        "INSERT INTO resource_values
         (environment_id, resource_definition_id, level_value_id, values_doc, overrides_doc)
         VALUES (?, ?, NULL, '{}', '{}')",
    )
    .bind(env_id)
    .bind(def_id)
    .execute(&store.pool)
    .await
    .unwrap_err()
    .into();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let store = SqlStore::in_memory().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_component(&Component {
            id: 5,
            name: "ghost".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err, HieraError::not_found("components", 5));
}
