use super::*;
use crate::{
    models::{DocumentKind, Identifier},
    resource_values::{ResourceValuesService, ValuesQuery},
    test_fixtures::fixture,
};
use serde_json::json;

fn new_component(name: &str, definitions: &[&str]) -> NewComponent {
    NewComponent {
        name: name.to_string(),
        resource_definitions: definitions
            .iter()
            .map(|d| InlineResourceDefinition {
                name: d.to_string(),
                content: Some(json!({"key": d})),
            })
            .collect(),
    }
}

#[tokio::test]
async fn create_component_with_inline_definitions() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));

    let created = service
        .create(new_component("component2", &["res_a", "res_b"]))
        .await
        .unwrap();

    assert_eq!(created.name, "component2");
    assert_eq!(created.resource_definitions.len(), 2);
    assert!(created
        .resource_definitions
        .iter()
        .all(|d| d.component_id == Some(created.id)));

    let fetched = service.get(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[test]
fn create_component_deserializes_without_definitions() {
    let request: NewComponent = serde_json::from_value(json!({"name": "bare"})).unwrap();

    assert!(request.resource_definitions.is_empty());
}

#[tokio::test]
async fn create_component_with_taken_name_is_conflict() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));

    let err = service
        .create(new_component("component1", &["orphan"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
    assert_eq!(service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_components_includes_owned_definitions() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));

    let components = service.list().await.unwrap();

    assert_eq!(components.len(), 1);
    assert_eq!(components[0].resource_definitions, vec![fx.definition.clone()]);
}

#[tokio::test]
async fn get_missing_component_is_not_found() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));

    let err = service.get(404).await.unwrap_err();

    assert_eq!(err.to_string(), "components not found by 404");
}

#[tokio::test]
async fn update_renames_and_reassigns_definitions() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));
    let other = service
        .create(new_component("component2", &["res_a"]))
        .await
        .unwrap();
    let moved = other.resource_definitions[0].id;

    service
        .update(
            fx.component.id,
            ComponentUpdate {
                name: Some("renamed".to_string()),
                resource_definitions: Some(vec![ResourceDefinitionRef { id: moved }]),
            },
        )
        .await
        .unwrap();

    let updated = service.get(fx.component.id).await.unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(
        updated
            .resource_definitions
            .iter()
            .map(|d| d.id)
            .collect::<Vec<_>>(),
        vec![moved]
    );
    assert!(service
        .get(other.id)
        .await
        .unwrap()
        .resource_definitions
        .is_empty());

    let mut tx = fx.store.begin().await.unwrap();
    let detached = tx
        .get_resource_definition(fx.definition.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detached.component_id, None);
}

#[tokio::test]
async fn update_with_unknown_definition_changes_nothing() {
    let fx = fixture().await;
    let service = ComponentsService::new(Arc::new(fx.store.clone()));

    let err = service
        .update(
            fx.component.id,
            ComponentUpdate {
                name: Some("renamed".to_string()),
                resource_definitions: Some(vec![ResourceDefinitionRef { id: 999 }]),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "NotFound");
    assert_eq!(service.get(fx.component.id).await.unwrap().name, "component1");
}

#[tokio::test]
async fn delete_component_cascades_to_definitions_and_values() {
    let fx = fixture().await;
    let store = Arc::new(fx.store.clone());
    let values = ResourceValuesService::new(store.clone());
    values
        .put_document(
            fx.environment.id,
            &[],
            &Identifier::from(fx.definition.id),
            DocumentKind::Values,
            json!({"k": "v"}),
        )
        .await
        .unwrap();

    ComponentsService::new(store)
        .delete(fx.component.id)
        .await
        .unwrap();

    let mut tx = fx.store.begin().await.unwrap();
    assert!(tx
        .get_resource_definition(fx.definition.id)
        .await
        .unwrap()
        .is_none());
    assert!(tx
        .list_resource_values(fx.environment.id, fx.definition.id, &[])
        .await
        .unwrap()
        .is_empty());
    let environment = tx.get_environment(fx.environment.id).await.unwrap().unwrap();
    assert!(environment.components.is_empty());
    drop(tx);

    let err = values
        .get_values(
            fx.environment.id,
            &[],
            &Identifier::from(fx.definition.id),
            &ValuesQuery::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn delete_missing_component_is_not_found() {
    let fx = fixture().await;

    let err = ComponentsService::new(Arc::new(fx.store.clone()))
        .delete(77)
        .await
        .unwrap_err();

    assert_eq!(err, HieraError::not_found("components", 77));
}
