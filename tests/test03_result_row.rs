use std::sync::Arc;

use indexmap::IndexMap;
use rawl::json::row_to_json;
use rawl::prelude::*;
use serde_json::json;

fn abc() -> ResultRow {
    ResultRow::from_values(
        Arc::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)],
    )
}

#[test]
fn index_and_name_address_the_same_value() -> Result<(), RawlError> {
    let row = abc();
    assert_eq!(row.get_key(0usize)?, row.get("a")?);
    assert_eq!(row.get("a")?, &RowValues::Int(1));
    Ok(())
}

#[test]
fn unknown_index_and_name_are_addressing_errors() {
    let row = abc();
    let by_index = row.get_key(99usize).unwrap_err();
    assert_eq!(by_index.kind(), ErrorKind::Addressing);
    assert_eq!(by_index.to_string(), "Unknown index value 99");

    let by_name = row.get("nonexistent").unwrap_err();
    assert_eq!(by_name.kind(), ErrorKind::Addressing);
    assert_eq!(by_name.to_string(), "nonexistent is not available");
}

#[test]
fn integer_like_keys_are_coerced() -> Result<(), RawlError> {
    let row = abc();
    let key = RowKey::coerce(&RowValues::Text(" 2 ".into()))?;
    assert_eq!(row.get_key(key)?, &RowValues::Int(3));
    Ok(())
}

#[test]
fn export_import_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let row = abc();
    let dict: IndexMap<String, RowValues> = row.to_dict();
    let rebuilt = ResultRow::from_dict(dict);
    assert_eq!(rebuilt.to_list(), row.to_list());
    assert_eq!(rebuilt, row);

    let bytes = serde_json::to_vec(&row)?;
    let decoded: ResultRow = serde_json::from_slice(&bytes)?;
    assert_eq!(decoded.columns(), row.columns());
    Ok(())
}

#[test]
fn iteration_and_views() {
    let row = abc();
    let collected: Vec<&RowValues> = (&row).into_iter().collect();
    assert_eq!(collected, vec![&RowValues::Int(1), &RowValues::Int(2), &RowValues::Int(3)]);
    assert_eq!(row.keys().cloned().collect::<Vec<_>>(), ["a", "b", "c"]);
    assert_eq!(row.values().count(), 3);
    assert_eq!(row.to_string(), r#"{"a": 1, "b": 2, "c": 3}"#);
}

#[test]
fn json_hook_renders_plain_objects() {
    assert_eq!(row_to_json(&abc()), json!({"a": 1, "b": 2, "c": 3}));
}
