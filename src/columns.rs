use std::sync::LazyLock;

use regex::Regex;

use crate::error::RawlError;

static COLUMN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("column separator pattern is valid"));

/// Something that enumerates a model's columns in declaration order.
///
/// Implement it on a field enum; a trailing `_` on a name is dropped, so a
/// variant named for a reserved word (`type_`) maps to the column `type`.
///
/// ```rust
/// use rawl::ColumnEnumeration;
///
/// enum TheCols { RawlId, Stamp, Name }
///
/// impl ColumnEnumeration for TheCols {
///     fn column_names() -> Vec<&'static str> {
///         vec!["rawl_id", "stamp", "name"]
///     }
/// }
/// ```
pub trait ColumnEnumeration {
    fn column_names() -> Vec<&'static str>;
}

/// The three accepted shapes of a column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// An explicit ordered list.
    List(Vec<String>),
    /// Names separated by whitespace and/or commas.
    Delimited(String),
    /// Names taken from a [`ColumnEnumeration`].
    Enumeration(Vec<String>),
}

impl ColumnSpec {
    #[must_use]
    pub fn enumeration<E: ColumnEnumeration>() -> Self {
        ColumnSpec::Enumeration(E::column_names().into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<String>> for ColumnSpec {
    fn from(value: Vec<String>) -> Self {
        ColumnSpec::List(value)
    }
}

impl From<Vec<&str>> for ColumnSpec {
    fn from(value: Vec<&str>) -> Self {
        ColumnSpec::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for ColumnSpec {
    fn from(value: &[&str]) -> Self {
        ColumnSpec::List(value.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ColumnSpec {
    fn from(value: [&str; N]) -> Self {
        ColumnSpec::List(value.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl From<&str> for ColumnSpec {
    fn from(value: &str) -> Self {
        ColumnSpec::Delimited(value.to_owned())
    }
}

impl From<String> for ColumnSpec {
    fn from(value: String) -> Self {
        ColumnSpec::Delimited(value)
    }
}

/// Canonical ordered column names of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
}

impl ColumnSet {
    /// Normalize any [`ColumnSpec`] into an ordered list.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` if the declaration yields no columns or a blank name.
    pub fn process_columns(spec: ColumnSpec) -> Result<Self, RawlError> {
        let names: Vec<String> = match spec {
            ColumnSpec::List(list) => list,
            ColumnSpec::Delimited(text) => COLUMN_SEPARATOR
                .split(&text)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            ColumnSpec::Enumeration(names) => names
                .into_iter()
                .map(|n| n.trim_end_matches('_').to_owned())
                .collect(),
        };

        if names.is_empty() {
            return Err(RawlError::ConfigError(
                "a model needs at least one column".to_string(),
            ));
        }
        if let Some(pos) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(RawlError::ConfigError(format!(
                "column at position {pos} has an empty name"
            )));
        }
        Ok(ColumnSet { names })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn first(&self) -> &str {
        // process_columns guarantees at least one column
        self.names.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Table name plus primary key column, resolved once at model construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table: String,
    pub pk: String,
}

impl TableDescriptor {
    /// The primary key defaults to the first column when `pk` is `None`.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` for an empty table or primary key name.
    pub fn new(table: &str, pk: Option<&str>, columns: &ColumnSet) -> Result<Self, RawlError> {
        if table.trim().is_empty() {
            return Err(RawlError::ConfigError("table name is empty".to_string()));
        }
        let pk = pk.unwrap_or_else(|| columns.first());
        if pk.trim().is_empty() {
            return Err(RawlError::ConfigError(
                "primary key name is empty".to_string(),
            ));
        }
        Ok(TableDescriptor {
            table: table.to_owned(),
            pk: pk.to_owned(),
        })
    }
}
