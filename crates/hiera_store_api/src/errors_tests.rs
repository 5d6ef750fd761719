//! Tests for error handling and HTTP conversion

use super::*;
use axum::body::to_bytes;

#[test]
fn test_not_found_maps_to_404() {
    let error = ApiError::from(HieraError::not_found("environments", 12));
    let (status, response) = convert_error(&error);

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response.error.code, "NotFound");
    assert_eq!(response.error.message, "environments not found by 12");
    assert!(response.error.details.is_none());
}

#[test]
fn test_level_errors_map_to_400() {
    let mismatch = ApiError::from(HieraError::LevelNameMismatch {
        expected: "lvl1".to_string(),
        actual: "lvlx".to_string(),
    });
    let unmatched = ApiError::from(HieraError::LevelsUnmatched {
        environment_id: 9,
        requested: vec!["lvl1".to_string(), "lvl2".to_string()],
        declared: vec!["lvl1".to_string()],
    });

    assert_eq!(convert_error(&mismatch).0, StatusCode::BAD_REQUEST);
    let (status, response) = convert_error(&unmatched);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error.code, "LevelsUnmatched");
    let details = response.error.details.expect("Should have details");
    assert_eq!(details["declared"], json!(["lvl1"]));
}

#[test]
fn test_conflicting_state_maps_to_409() {
    for error in [
        HieraError::InvalidPath {
            path: "[]".to_string(),
            reason: "Keys path should contain at least one key".to_string(),
        },
        HieraError::PathNotFound {
            path: "[\"a\"]".to_string(),
            key: "a".to_string(),
        },
        HieraError::UnknownOperation {
            operation: "merge".to_string(),
        },
        HieraError::conflict("Components duplicates: 1"),
        HieraError::DocumentNotObject {
            document: "values".to_string(),
            lookup_path: "/lvl1/val1/".to_string(),
            found: "an array".to_string(),
        },
    ] {
        let kind = error.kind();
        let (status, response) = convert_error(&ApiError::from(error));
        assert_eq!(status, StatusCode::CONFLICT, "{}", kind);
        assert_eq!(response.error.code, kind);
    }
}

#[test]
fn test_store_error_hides_reason() {
    let error = ApiError::from(HieraError::Store {
        reason: "connection reset".to_string(),
    });
    let (status, response) = convert_error(&error);

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error.code, "StoreError");
    assert_eq!(response.error.message, "An internal error occurred");
}

#[test]
fn test_route_not_found_maps_to_404() {
    let error = ApiError::RouteNotFound {
        path: "bogus".to_string(),
    };

    assert_eq!(error.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_into_response_writes_error_body() {
    let response = ApiError::from(HieraError::validation(
        "Lookup path tracing can be done only for effective values",
    ))
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        json!({
            "error": {
                "code": "RequestValidation",
                "message": "Lookup path tracing can be done only for effective values"
            }
        })
    );
}
