//! Identifier and literal quoting.
//!
//! These are the only two ways a dynamic value reaches statement text. Identifiers
//! are double-quoted with embedded quotes doubled; literals are rendered per
//! [`RowValues`] variant for the target backend, with text single-quoted and
//! embedded quotes doubled. The two paths never share code so one can't be
//! mistaken for the other.

use std::fmt::Write;

use crate::error::RawlError;
use crate::types::{DatabaseType, RowValues};

/// Quote a single identifier (`my"col` becomes `"my""col"`).
///
/// # Errors
/// Returns `RawlError::ParameterError` for an empty identifier or one containing NUL.
pub fn quote_identifier(name: &str) -> Result<String, RawlError> {
    if name.is_empty() {
        return Err(RawlError::ParameterError(
            "identifier must not be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(RawlError::ParameterError(format!(
            "identifier {name:?} contains a NUL byte"
        )));
    }

    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    Ok(quoted)
}

/// Quote a column reference, quoting each dot-separated segment on its own so
/// `t.name` becomes `"t"."name"`.
///
/// # Errors
/// Returns `RawlError::ParameterError` if any segment is not a valid identifier.
pub fn quote_column(column: &str) -> Result<String, RawlError> {
    let segments = column
        .split('.')
        .map(quote_identifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join("."))
}

/// Render a value as a literal for `dialect`.
///
/// Blobs become `X'..'` on SQLite and `decode('..', 'hex')` on Postgres. Postgres
/// text containing a backslash uses the ` E'..'` form with backslashes doubled, so
/// it reads back unchanged whatever `standard_conforming_strings` is set to.
///
/// # Errors
/// Returns `RawlError::ParameterError` for text that cannot be represented (NUL bytes).
pub fn quote_literal(value: &RowValues, dialect: DatabaseType) -> Result<String, RawlError> {
    let literal = match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Bool(true) => "TRUE".to_string(),
        RowValues::Bool(false) => "FALSE".to_string(),
        // a leading space keeps `x-{1}` from turning into a `--` comment
        RowValues::Int(i) if *i < 0 => format!(" {i}"),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) if f.is_nan() => "'NaN'".to_string(),
        RowValues::Float(f) if f.is_infinite() && *f > 0.0 => "'Infinity'".to_string(),
        RowValues::Float(f) if f.is_infinite() => "'-Infinity'".to_string(),
        RowValues::Float(f) if f.is_sign_negative() => format!(" {f:?}"),
        RowValues::Float(f) => format!("{f:?}"),
        RowValues::Text(s) => quote_text(s, dialect)?,
        RowValues::Timestamp(ts) => {
            quote_text(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(), dialect)?
        }
        RowValues::JSON(v) => quote_text(&v.to_string(), dialect)?,
        RowValues::Blob(bytes) => quote_blob(bytes, dialect),
    };
    Ok(literal)
}

fn quote_text(s: &str, dialect: DatabaseType) -> Result<String, RawlError> {
    if s.contains('\0') {
        return Err(RawlError::ParameterError(
            "text literals cannot contain NUL bytes".to_string(),
        ));
    }
    let escape_backslashes = match dialect {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => s.contains('\\'),
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => false,
    };

    let mut quoted = String::with_capacity(s.len() + 4);
    if escape_backslashes {
        quoted.push_str(" E");
    }
    quoted.push('\'');
    for ch in s.chars() {
        if ch == '\'' || (escape_backslashes && ch == '\\') {
            quoted.push(ch);
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    Ok(quoted)
}

fn quote_blob(bytes: &[u8], dialect: DatabaseType) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // writing to a String cannot fail
        let _ = write!(hex, "{b:02x}");
    }
    match dialect {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => format!("decode('{hex}', 'hex')"),
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => format!("X'{hex}'"),
    }
}
