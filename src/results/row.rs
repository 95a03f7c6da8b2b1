use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RawlError;
use crate::types::RowValues;

/// How a [`ResultRow`] field is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey<'a> {
    /// Direct lookup in the row's mapping.
    Name(&'a str),
    /// Position in the working column list; negative counts from the end.
    Index(i64),
}

impl<'a> From<&'a str> for RowKey<'a> {
    fn from(value: &'a str) -> Self {
        RowKey::Name(value)
    }
}

impl<'a> From<&'a String> for RowKey<'a> {
    fn from(value: &'a String) -> Self {
        RowKey::Name(value.as_str())
    }
}

impl From<usize> for RowKey<'_> {
    fn from(value: usize) -> Self {
        RowKey::Index(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for RowKey<'_> {
    fn from(value: i64) -> Self {
        RowKey::Index(value)
    }
}

impl From<i32> for RowKey<'_> {
    fn from(value: i32) -> Self {
        RowKey::Index(i64::from(value))
    }
}

impl RowKey<'static> {
    /// Turn an arbitrary value into a positional key.
    ///
    /// Integers are used as-is, floats without a fractional part and text that
    /// parses as an integer are converted.
    ///
    /// # Errors
    /// Returns `RawlError::IndexOutOfRange` carrying the value when it is not integer-like.
    pub fn coerce(value: &RowValues) -> Result<Self, RawlError> {
        match value {
            RowValues::Int(i) => Ok(RowKey::Index(*i)),
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                Ok(RowKey::Index(*f as i64))
            }
            RowValues::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(RowKey::Index)
                .map_err(|_| RawlError::IndexOutOfRange(value.to_string())),
            other => Err(RawlError::IndexOutOfRange(other.to_string())),
        }
    }
}

/// One fetched row, addressable by column name or by position.
///
/// The working column list is the shape of the query that produced the row and
/// may differ from the model's columns. Keys in the mapping replace `.` with `_`
/// so `r.rawl_id` is stored as `r_rawl_id`; positional access applies the same
/// rewrite. The set of keys is fixed at construction, values may be reassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    columns: Arc<Vec<String>>,
    data: IndexMap<String, RowValues>,
}

/// Mapping key for a working column.
pub(crate) fn column_key(column: &str) -> String {
    column.replace('.', "_")
}

impl ResultRow {
    /// Create a row from its working columns and its name/value mapping.
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, data: IndexMap<String, RowValues>) -> Self {
        Self { columns, data }
    }

    /// Zip working columns with positional values.
    ///
    /// Extra columns without a value are skipped; a repeated column name keeps its
    /// first position and its last value.
    #[must_use]
    pub fn from_values(columns: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let mut data = IndexMap::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(values) {
            data.insert(column_key(column), value);
        }
        Self { columns, data }
    }

    /// Rebuild a row from an exported mapping; the keys become the working columns.
    #[must_use]
    pub fn from_dict(data: IndexMap<String, RowValues>) -> Self {
        let columns = Arc::new(data.keys().cloned().collect());
        Self { columns, data }
    }

    /// The working column names, as given by the query.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Look up a value by column name.
    ///
    /// # Errors
    /// Returns `RawlError::ColumnNotFound` if the row has no such column.
    pub fn get(&self, name: &str) -> Result<&RowValues, RawlError> {
        self.data
            .get(name)
            .ok_or_else(|| RawlError::ColumnNotFound(name.to_string()))
    }

    /// Look up a value by position in the working column list.
    ///
    /// # Errors
    /// Returns `RawlError::IndexOutOfRange` for a position with no value.
    pub fn get_index(&self, index: i64) -> Result<&RowValues, RawlError> {
        let key = self.key_at(index)?;
        self.data
            .get(&key)
            .ok_or_else(|| RawlError::IndexOutOfRange(index.to_string()))
    }

    /// Look up by name or position.
    ///
    /// # Errors
    /// Returns `RawlError::ColumnNotFound` or `RawlError::IndexOutOfRange`.
    pub fn get_key<'k>(&self, key: impl Into<RowKey<'k>>) -> Result<&RowValues, RawlError> {
        match key.into() {
            RowKey::Name(name) => self.get(name),
            RowKey::Index(index) => self.get_index(index),
        }
    }

    /// Reassign the value of an existing column.
    ///
    /// # Errors
    /// Returns `RawlError::ColumnNotFound` if the row has no such column.
    pub fn set(&mut self, name: &str, value: impl Into<RowValues>) -> Result<(), RawlError> {
        let slot = self
            .data
            .get_mut(name)
            .ok_or_else(|| RawlError::ColumnNotFound(name.to_string()))?;
        *slot = value.into();
        Ok(())
    }

    /// Reassign the value at a position.
    ///
    /// # Errors
    /// Returns `RawlError::IndexOutOfRange` for a position with no value.
    pub fn set_index(&mut self, index: i64, value: impl Into<RowValues>) -> Result<(), RawlError> {
        let key = self.key_at(index)?;
        let slot = self
            .data
            .get_mut(&key)
            .ok_or_else(|| RawlError::IndexOutOfRange(index.to_string()))?;
        *slot = value.into();
        Ok(())
    }

    /// Reassign by name or position.
    ///
    /// # Errors
    /// Returns `RawlError::ColumnNotFound` or `RawlError::IndexOutOfRange`.
    pub fn set_key<'k>(
        &mut self,
        key: impl Into<RowKey<'k>>,
        value: impl Into<RowValues>,
    ) -> Result<(), RawlError> {
        match key.into() {
            RowKey::Name(name) => self.set(name, value),
            RowKey::Index(index) => self.set_index(index, value),
        }
    }

    fn key_at(&self, index: i64) -> Result<String, RawlError> {
        let len = i64::try_from(self.columns.len()).unwrap_or(i64::MAX);
        let resolved = if index < 0 { index + len } else { index };
        usize::try_from(resolved)
            .ok()
            .and_then(|pos| self.columns.get(pos))
            .map(|column| column_key(column))
            .ok_or_else(|| RawlError::IndexOutOfRange(index.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values in column order.
    pub fn iter(&self) -> indexmap::map::Values<'_, String, RowValues> {
        self.data.values()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, RowValues> {
        self.data.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, RowValues> {
        self.data.values()
    }

    /// Export the mapping.
    #[must_use]
    pub fn to_dict(&self) -> IndexMap<String, RowValues> {
        self.data.clone()
    }

    #[must_use]
    pub fn into_dict(self) -> IndexMap<String, RowValues> {
        self.data
    }

    /// Export the values in column order.
    #[must_use]
    pub fn to_list(&self) -> Vec<RowValues> {
        self.data.values().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a ResultRow {
    type Item = &'a RowValues;
    type IntoIter = indexmap::map::Values<'a, String, RowValues>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.values()
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> ResultRow {
        ResultRow::from_values(
            Arc::new(vec!["a".into(), "b".into(), "c".into()]),
            vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)],
        )
    }

    #[test]
    fn name_and_index_agree() {
        let row = abc();
        assert_eq!(row.get_key(0usize).unwrap(), &RowValues::Int(1));
        assert_eq!(row.get_key("a").unwrap(), &RowValues::Int(1));
        assert_eq!(row.get_index(-1).unwrap(), &RowValues::Int(3));
    }

    #[test]
    fn unknown_keys_are_addressing_errors() {
        let row = abc();
        let err = row.get_index(99).unwrap_err();
        assert!(matches!(err, RawlError::IndexOutOfRange(ref k) if k == "99"));
        assert!(err.to_string().contains("99"));
        assert!(matches!(
            row.get("nonexistent"),
            Err(RawlError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn coercible_keys() {
        let row = abc();
        let key = RowKey::coerce(&RowValues::Text("1".into())).unwrap();
        assert_eq!(row.get_key(key).unwrap(), &RowValues::Int(2));
        let key = RowKey::coerce(&RowValues::Float(2.0)).unwrap();
        assert_eq!(row.get_key(key).unwrap(), &RowValues::Int(3));
        assert!(RowKey::coerce(&RowValues::Text("b".into())).is_err());
    }

    #[test]
    fn writes_mirror_reads() {
        let mut row = abc();
        row.set_key(1usize, "two").unwrap();
        row.set("c", 30).unwrap();
        assert_eq!(row.get("b").unwrap(), &RowValues::Text("two".into()));
        assert_eq!(row.get_index(2).unwrap(), &RowValues::Int(30));
        assert!(row.set("d", 4).is_err());
        assert!(row.set_index(3, 4).is_err());
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn iteration_yields_values_in_column_order() {
        let row = abc();
        let values: Vec<_> = row.iter().cloned().collect();
        assert_eq!(values, row.to_list());
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn dotted_columns_use_underscored_keys() {
        let row = ResultRow::from_values(
            Arc::new(vec!["r.rawl_id".into(), "name".into()]),
            vec![RowValues::Int(7), RowValues::Text("x".into())],
        );
        assert_eq!(row.get("r_rawl_id").unwrap(), &RowValues::Int(7));
        assert_eq!(row.get_index(0).unwrap(), &RowValues::Int(7));
        assert!(row.get("r.rawl_id").is_err());
    }

    #[test]
    fn duplicate_columns_keep_last_value() {
        let row = ResultRow::from_values(
            Arc::new(vec!["a".into(), "a".into()]),
            vec![RowValues::Int(1), RowValues::Int(2)],
        );
        assert_eq!(row.len(), 1);
        assert_eq!(row.get_index(0).unwrap(), &RowValues::Int(2));
    }

    #[test]
    fn dict_round_trip() {
        let row = abc();
        let back = ResultRow::from_dict(row.to_dict());
        assert_eq!(back, row);
        assert_eq!(back.to_dict(), row.to_dict());
    }

    #[test]
    fn serde_round_trip_keeps_columns() {
        let row = abc();
        let encoded = serde_json::to_string(&row).unwrap();
        let decoded: ResultRow = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, row);
        assert_eq!(decoded.get_index(2).unwrap(), &RowValues::Int(3));
    }
}
