//! Tests for effective value computation.

use super::*;
use crate::models::{HierarchyLevel, LevelValue};
use serde_json::json;

fn resolved(level_id: i64, name: &str, value_id: i64, value: &str) -> ResolvedLevel {
    ResolvedLevel {
        level: HierarchyLevel {
            id: level_id,
            name: name.to_string(),
            environment_id: 9,
            parent_id: if level_id == 1 { None } else { Some(level_id - 1) },
        },
        level_value: LevelValue {
            id: value_id,
            level_id,
            value: value.to_string(),
        },
    }
}

fn row(level_value_id: Option<i64>, values: Value, overrides: Value) -> ResourceValues {
    ResourceValues {
        id: level_value_id.unwrap_or(0) + 100,
        environment_id: 9,
        resource_definition_id: 5,
        level_value_id,
        values,
        overrides,
    }
}

fn chain() -> Vec<ResolvedLevel> {
    vec![resolved(1, "lvl1", 11, "val1"), resolved(2, "lvl2", 22, "val2")]
}

fn layered_rows() -> Vec<ResourceValues> {
    vec![
        row(None, json!({"key0": "A", "key1": "B"}), json!({})),
        row(Some(11), json!({"key0": "C"}), json!({})),
        row(Some(22), json!({"key1": "D"}), json!({})),
    ]
}

#[test]
fn deeper_values_replace_shallower_keys_independently() {
    let calculator = EffectiveValueCalculator::new();

    let result = calculator.compute(&chain(), &layered_rows(), false).unwrap().into_json();

    assert_eq!(result, json!({"key0": "C", "key1": "D"}));
}

#[test]
fn lookup_trace_records_the_writing_scope() {
    let calculator = EffectiveValueCalculator::new();

    let result = calculator.compute(&chain(), &layered_rows(), true).unwrap().into_json();

    assert_eq!(
        result,
        json!({
            "key0": ["C", "/lvl1/val1/"],
            "key1": ["D", "/lvl1/val1/lvl2/val2/"],
        })
    );
}

#[test]
fn overrides_win_over_values_in_same_scope() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![row(None, json!({"k": 1}), json!({"k": 2}))];

    let result = calculator.compute(&[], &rows, false).unwrap().into_json();

    assert_eq!(result, json!({"k": 2}));
}

#[test]
fn shallow_overrides_lose_to_deeper_values() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![
        row(None, json!({}), json!({"k": "root-override"})),
        row(Some(11), json!({"k": "lvl1-value"}), json!({})),
    ];

    let result = calculator.compute(&chain(), &rows, false).unwrap().into_json();

    assert_eq!(result, json!({"k": "lvl1-value"}));
}

#[test]
fn nested_objects_are_replaced_not_merged() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![
        row(None, json!({"db": {"host": "a", "port": 1}}), json!({})),
        row(Some(11), json!({"db": {"host": "b"}}), json!({})),
    ];

    let result = calculator.compute(&chain(), &rows, false).unwrap().into_json();

    assert_eq!(result, json!({"db": {"host": "b"}}));
}

#[test]
fn rows_outside_the_chain_are_ignored() {
    let calculator = EffectiveValueCalculator::new();
    let mut rows = layered_rows();
    rows.push(row(Some(99), json!({"key0": "elsewhere"}), json!({})));

    let result = calculator.compute(&chain()[..1], &rows, false).unwrap().into_json();

    assert_eq!(result, json!({"key0": "C", "key1": "B"}));
}

#[test]
fn no_rows_yields_empty_document() {
    let calculator = EffectiveValueCalculator::new();

    assert_eq!(calculator.compute(&chain(), &[], true).unwrap().into_json(), json!({}));
}

#[test]
fn root_only_values_carry_root_lookup_path() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![row(None, json!({"key": "value"}), json!({}))];

    let result = calculator.compute(&chain()[..1], &rows, true).unwrap();

    assert_eq!(
        result,
        EffectiveDocument::Traced(BTreeMap::from([(
            "key".to_string(),
            LookupEntry(json!("value"), "/".to_string())
        )]))
    );
}

#[test]
fn non_object_document_fails_the_merge() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![
        row(None, json!({"k": 1}), json!({})),
        row(Some(11), json!([1, 2]), json!({})),
    ];

    let err = calculator.compute(&chain(), &rows, false).unwrap_err();

    assert_eq!(
        err,
        HieraError::DocumentNotObject {
            document: "values".to_string(),
            lookup_path: "/lvl1/val1/".to_string(),
            found: "an array".to_string(),
        }
    );
}

#[test]
fn null_overrides_are_not_skipped() {
    let calculator = EffectiveValueCalculator::new();
    let rows = vec![row(None, json!({"k": 1}), Value::Null)];

    let err = calculator.compute(&[], &rows, true).unwrap_err();

    assert_eq!(err.kind(), "DocumentNotObject");
    assert_eq!(
        err.to_string(),
        "Resource overrides at / is null, expected an object"
    );
}
