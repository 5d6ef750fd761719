use super::*;
use crate::{
    models::{DocumentKind, Identifier},
    resource_values::{ResourceValuesService, ValuesQuery},
    test_fixtures::fixture,
};
use serde_json::json;

fn service(store: &crate::sql_store::SqlStore) -> ResourceDefinitionsService {
    ResourceDefinitionsService::new(Arc::new(store.clone()))
}

#[tokio::test]
async fn create_and_get_definition() {
    let fx = fixture().await;
    let service = service(&fx.store);

    let created = service
        .create(NewResourceDefinition {
            name: "resdef2".to_string(),
            component_id: Some(fx.component.id),
            content: Some(json!({"type": "string"})),
        })
        .await
        .unwrap();

    assert_eq!(service.get(created.id).await.unwrap(), created);
    assert_eq!(created.content, json!({"type": "string"}));
}

#[tokio::test]
async fn create_with_unknown_component_is_conflict() {
    let fx = fixture().await;

    let err = service(&fx.store)
        .create(NewResourceDefinition {
            name: "dangling".to_string(),
            component_id: Some(500),
            content: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "IntegrityConflict");
}

#[tokio::test]
async fn list_filters_by_component() {
    let fx = fixture().await;
    let service = service(&fx.store);
    let unassigned = service
        .create(NewResourceDefinition {
            name: "free".to_string(),
            component_id: None,
            content: None,
        })
        .await
        .unwrap();

    let all = service.list(ComponentFilter::All).await.unwrap();
    let owned = service
        .list(ComponentFilter::Component(fx.component.id))
        .await
        .unwrap();
    let free = service.list(ComponentFilter::Unassigned).await.unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(owned, vec![fx.definition.clone()]);
    assert_eq!(free, vec![unassigned]);
}

#[test]
fn update_payload_distinguishes_null_from_absent() {
    let detach: ResourceDefinitionUpdate =
        serde_json::from_value(json!({"component_id": null})).unwrap();
    let untouched: ResourceDefinitionUpdate = serde_json::from_value(json!({"name": "n"})).unwrap();

    assert_eq!(detach.component_id, Some(None));
    assert_eq!(detach.content, None);
    assert_eq!(untouched.component_id, None);
    assert_eq!(untouched.name.as_deref(), Some("n"));
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let fx = fixture().await;
    let service = service(&fx.store);

    service
        .update(
            fx.definition.id,
            ResourceDefinitionUpdate {
                name: Some("renamed".to_string()),
                ..ResourceDefinitionUpdate::default()
            },
        )
        .await
        .unwrap();

    let updated = service.get(fx.definition.id).await.unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.component_id, Some(fx.component.id));
    assert_eq!(updated.content, fx.definition.content);
}

#[tokio::test]
async fn update_keys_edits_content() {
    let fx = fixture().await;
    let service = service(&fx.store);

    service
        .update_keys(
            fx.definition.id,
            "set",
            &[vec![json!("key"), json!("other.key")], vec![json!("extra"), json!([1, 2])]],
        )
        .await
        .unwrap();
    service
        .update_keys(fx.definition.id, "delete", &[vec![json!("extra"), json!(0)]])
        .await
        .unwrap();

    let content = service.get(fx.definition.id).await.unwrap().content;
    assert_eq!(content, json!({"key": "other.key", "extra": [2]}));
}

#[tokio::test]
async fn update_keys_failure_keeps_content() {
    let fx = fixture().await;
    let service = service(&fx.store);

    let err = service
        .update_keys(fx.definition.id, "delete", &[vec![json!("key"), json!("deeper")]])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PathUnreachable");
    assert_eq!(
        service.get(fx.definition.id).await.unwrap().content,
        fx.definition.content
    );
}

#[tokio::test]
async fn delete_definition_removes_its_values() {
    let fx = fixture().await;
    let store = Arc::new(fx.store.clone());
    let values = ResourceValuesService::new(store.clone());
    let resource = Identifier::from(fx.definition.id);
    values
        .put_document(fx.environment.id, &[], &resource, DocumentKind::Values, json!({"k": 1}))
        .await
        .unwrap();

    ResourceDefinitionsService::new(store)
        .delete(fx.definition.id)
        .await
        .unwrap();

    let mut tx = fx.store.begin().await.unwrap();
    assert!(tx
        .find_resource_values(fx.environment.id, fx.definition.id, None)
        .await
        .unwrap()
        .is_none());
    drop(tx);
    let err = values
        .get_values(fx.environment.id, &[], &resource, &ValuesQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn delete_missing_definition_is_not_found() {
    let fx = fixture().await;

    let err = service(&fx.store).delete(31).await.unwrap_err();

    assert_eq!(err.to_string(), "resource_definitions not found by 31");
}
