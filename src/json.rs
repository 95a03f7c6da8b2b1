//! Plain JSON rendering of result rows.
//!
//! Timestamps become ISO-8601 strings, blobs become `\x`-prefixed hex and
//! non-finite floats become `null`.

use std::fmt::Write;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};

use crate::results::ResultRow;
use crate::types::RowValues;

const ISO_8601: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[must_use]
pub fn value_to_json(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Number((*i).into()),
        RowValues::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        RowValues::Text(s) => Value::String(s.clone()),
        RowValues::Bool(b) => Value::Bool(*b),
        RowValues::Timestamp(ts) => Value::String(ts.format(ISO_8601).to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(v) => v.clone(),
        RowValues::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 2);
            hex.push_str("\\x");
            for b in bytes {
                let _ = write!(hex, "{b:02x}");
            }
            Value::String(hex)
        }
    }
}

/// A row as a JSON object keyed by column.
#[must_use]
pub fn row_to_json(row: &ResultRow) -> Value {
    let map: Map<String, Value> = row
        .keys()
        .zip(row.values())
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect();
    Value::Object(map)
}

#[must_use]
pub fn rows_to_json(rows: &[ResultRow]) -> Value {
    Value::Array(rows.iter().map(row_to_json).collect())
}

/// Serialize a row as a plain object inside any serde output.
///
/// ```rust
/// use rawl::json::JsonRow;
/// use rawl::prelude::*;
///
/// let row = ResultRow::from_dict([("name".to_string(), RowValues::from("a"))].into_iter().collect());
/// assert_eq!(serde_json::to_string(&JsonRow(&row)).unwrap(), r#"{"name":"a"}"#);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct JsonRow<'a>(pub &'a ResultRow);

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.keys().zip(self.0.values()) {
            map.serialize_entry(key, &value_to_json(value))?;
        }
        map.end()
    }
}
