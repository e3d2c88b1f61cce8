//! Tests for the flatten module

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;
use test_case::test_case;

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value, "id").unwrap()
}

fn pairs(value: serde_json::Value) -> Vec<(String, String)> {
    let record = record(value);
    flatten(&record)
        .map(|row| (row.key().to_string(), row.value().to_string()))
        .collect()
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

// ============================================================================
// Record Tests
// ============================================================================

#[test]
fn test_record_string_id() {
    let r = record(json!({"id": "abc-1", "displayName": "Ada"}));
    assert_eq!(r.id(), "abc-1");
    assert_eq!(r.id_field(), "id");
    assert_eq!(r.fields().len(), 2);
}

#[test]
fn test_record_numeric_id() {
    let r = record(json!({"id": 42}));
    assert_eq!(r.id(), "42");
}

#[test]
fn test_record_custom_id_field() {
    let r = Record::from_value(json!({"objectId": "x9", "id": "ignored"}), "objectId").unwrap();
    assert_eq!(r.id(), "x9");
}

#[test_case(json!({"displayName": "no id"}) ; "missing")]
#[test_case(json!({"id": null}) ; "null")]
#[test_case(json!({"id": ""}) ; "empty")]
#[test_case(json!({"id": {"nested": 1}}) ; "object")]
fn test_record_without_usable_id(value: serde_json::Value) {
    let err = Record::from_value(value, "id").unwrap_err();
    assert!(matches!(err, Error::MissingRecordId { .. }));
}

#[test]
fn test_record_not_an_object() {
    let err = Record::from_value(json!(["a", "b"]), "id").unwrap_err();
    assert!(matches!(err, Error::MalformedPage { .. }));
}

// ============================================================================
// Scalar Rendering Tests
// ============================================================================

#[test_case(json!(null), "None" ; "null")]
#[test_case(json!(true), "True" ; "bool true")]
#[test_case(json!(false), "False" ; "bool false")]
#[test_case(json!(7), "7" ; "integer")]
#[test_case(json!(2.5), "2.5" ; "float")]
#[test_case(json!("text"), "text" ; "string")]
#[test_case(json!(""), "" ; "empty string")]
fn test_render_scalar(value: serde_json::Value, expected: &str) {
    assert_eq!(render_scalar(&value), expected);
}

#[test]
fn test_flat_row_strips_control_characters() {
    let row = FlatRow::new("1", "job\tTitle", "line one\nline two\r\n\tend");
    assert_eq!(row.key(), "jobTitle");
    assert_eq!(row.value(), "line oneline twoend");
    assert_eq!(row.to_string(), "1\tjobTitle\tline oneline twoend");
}

#[test]
fn test_record_id_with_control_characters_stays_one_field() {
    let r = record(json!({"id": "u\t1\r\n", "displayName": "Ada"}));
    let rows: Vec<FlatRow> = flatten(&r).collect();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record_id(), "u1");
    assert_eq!(rows[0].to_string(), "u1\tdisplayName\tAda");
}

// ============================================================================
// Addressing Tests
// ============================================================================

#[test]
fn test_top_level_scalars_keep_their_keys() {
    let rows = pairs(json!({
        "id": "1",
        "displayName": "Ada Lovelace",
        "accountEnabled": true,
        "jobTitle": null
    }));
    assert_eq!(
        rows,
        vec![
            pair("displayName", "Ada Lovelace"),
            pair("accountEnabled", "True"),
            pair("jobTitle", "None"),
        ]
    );
}

#[test]
fn test_nested_object_uses_its_key_as_prefix() {
    let rows = pairs(json!({
        "id": "1",
        "org": {"level1Name": "Corp", "level1Code": "C1"}
    }));
    assert_eq!(
        rows,
        vec![pair("org.level1Name", "Corp"), pair("org.level1Code", "C1")]
    );
}

#[test]
fn test_deep_nesting_is_labelled_by_immediate_parent_only() {
    let rows = pairs(json!({
        "id": "1",
        "a": {
            "x": 1,
            "b": {"c": {"leaf": "deep"}, "y": 2},
            "z": 3
        },
        "after": "top"
    }));
    assert_eq!(
        rows,
        vec![
            pair("a.x", "1"),
            pair("c.leaf", "deep"),
            pair("b.y", "2"),
            pair("a.z", "3"),
            pair("after", "top"),
        ]
    );
}

#[test]
fn test_scalar_array_positions_are_one_based() {
    let rows = pairs(json!({"id": "1", "phones": ["555-1", "555-2"]}));
    assert_eq!(rows, vec![pair("phones_1", "555-1"), pair("phones_2", "555-2")]);
}

#[test]
fn test_array_of_objects_emits_bare_keys() {
    let rows = pairs(json!({"id": "1", "tags": [{"k": "a"}, {"k": "b"}]}));
    assert_eq!(rows, vec![pair("k", "a"), pair("k", "b")]);
}

#[test]
fn test_array_inside_object_ignores_object_label() {
    let rows = pairs(json!({
        "id": "1",
        "contact": {"mail": "a@b.c", "phones": ["1", "2"]}
    }));
    assert_eq!(
        rows,
        vec![
            pair("contact.mail", "a@b.c"),
            pair("phones_1", "1"),
            pair("phones_2", "2"),
        ]
    );
}

#[test]
fn test_object_inside_array_element_gets_its_own_label() {
    let rows = pairs(json!({
        "id": "1",
        "licenses": [{"skuId": "s1", "plan": {"name": "E3"}}]
    }));
    assert_eq!(rows, vec![pair("skuId", "s1"), pair("plan.name", "E3")]);
}

#[test]
fn test_nested_arrays_extend_the_position_key() {
    let rows = pairs(json!({"id": "1", "grid": [["a", "b"], ["c"]]}));
    assert_eq!(
        rows,
        vec![pair("grid_1_1", "a"), pair("grid_1_2", "b"), pair("grid_2_1", "c")]
    );
}

#[test]
fn test_mixed_array_elements() {
    let rows = pairs(json!({"id": "1", "mixed": ["s", {"k": "v"}, null]}));
    assert_eq!(
        rows,
        vec![pair("mixed_1", "s"), pair("k", "v"), pair("mixed_3", "None")]
    );
}

#[test]
fn test_empty_containers_emit_nothing() {
    let rows = pairs(json!({"id": "1", "empty": {}, "none": [], "name": "x"}));
    assert_eq!(rows, vec![pair("name", "x")]);
}

#[test]
fn test_nested_id_fields_are_emitted() {
    let rows = pairs(json!({"id": "1", "manager": {"id": "2"}}));
    assert_eq!(rows, vec![pair("manager.id", "2")]);
}

#[test]
fn test_null_inside_object_is_none() {
    let rows = pairs(json!({"id": "1", "org": {"level5Name": null}}));
    assert_eq!(rows, vec![pair("org.level5Name", "None")]);
}

// ============================================================================
// Property Tests
// ============================================================================

fn sample_records() -> Vec<Record> {
    vec![
        record(json!({
            "id": "u-1",
            "displayName": "Tab\tBy",
            "org": {"level1Name": "Line\nBreak", "level1Code": null},
            "phones": ["1\r\n", "2"]
        })),
        record(json!({
            "id": "u-2",
            "tags": [{"k": "a"}, {"k": "b\t"}],
            "deep": {"x": {"y": {"z": "1"}}}
        })),
        record(json!({"id": "u-3", "only": "field"})),
    ]
}

#[test]
fn test_every_row_carries_its_record_id() {
    let records = sample_records();
    let mut seen = HashSet::new();

    for r in &records {
        for row in flatten(r) {
            assert_eq!(row.record_id(), r.id());
            seen.insert(row.record_id().to_string());
        }
    }

    assert_eq!(seen.len(), records.len());
}

#[test]
fn test_rows_are_delimiter_safe() {
    for r in &sample_records() {
        for row in flatten(r) {
            for field in row.fields() {
                assert!(!field.contains(['\t', '\n', '\r']), "unsafe field {field:?}");
            }
        }
    }
}

#[test]
fn test_reflatten_is_identical() {
    for r in &sample_records() {
        let first: Vec<FlatRow> = flatten(r).collect();
        let second: Vec<FlatRow> = flatten(r).collect();
        assert_eq!(first, second);
    }
}

#[test]
fn test_flatten_is_lazy() {
    let r = record(json!({"id": "1", "a": "1", "b": "2", "c": "3"}));
    let mut rows = flatten(&r);
    assert_eq!(rows.next().unwrap().key(), "a");
    assert_eq!(rows.next().unwrap().key(), "b");
    assert_eq!(rows.next().unwrap().key(), "c");
    assert!(rows.next().is_none());
}
