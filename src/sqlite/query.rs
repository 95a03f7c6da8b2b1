use rusqlite::Connection;
use rusqlite::types::Value;

use crate::cursor::Outcome;
use crate::error::RawlError;
use crate::types::{RowValues, parse_timestamp};

/// Run one fully rendered statement.
///
/// A statement with no result columns reports `changes()`; anything else, including
/// `INSERT .. RETURNING`, is stepped to completion and buffered.
pub(crate) fn run(conn: &Connection, sql: &str) -> Result<Outcome, RawlError> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        let affected = stmt.execute([])?;
        return Ok(Outcome::affected(u64::try_from(affected).unwrap_or(u64::MAX)));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|col| col.decl_type().map(str::to_ascii_uppercase))
        .collect();

    let mut rows = stmt.query([])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(columns.len());
        for (idx, decl) in decl_types.iter().enumerate() {
            let raw: Value = row.get(idx)?;
            row_values.push(extract_value(raw, decl.as_deref()));
        }
        values.push(row_values);
    }
    Ok(Outcome::fetched(columns, values))
}

/// SQLite stores timestamps as text; columns declared `TIMESTAMP`/`DATETIME` are
/// parsed back, anything unparsable stays text.
fn extract_value(raw: Value, decl_type: Option<&str>) -> RowValues {
    match raw {
        Value::Null => RowValues::Null,
        Value::Integer(i) => match decl_type {
            Some("BOOLEAN" | "BOOL") => RowValues::Bool(i != 0),
            _ => RowValues::Int(i),
        },
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => match decl_type {
            Some(decl) if decl.starts_with("TIMESTAMP") || decl == "DATETIME" => {
                parse_timestamp(&s).map_or(RowValues::Text(s), RowValues::Timestamp)
            }
            Some("JSON" | "JSONB") => serde_json::from_str(&s)
                .map_or(RowValues::Text(s), RowValues::JSON),
            _ => RowValues::Text(s),
        },
        Value::Blob(b) => RowValues::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn statements_without_columns_report_changes() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        let outcome = run(&conn, "INSERT INTO t (name) VALUES ('a'), ('b')").unwrap();
        assert_eq!(outcome.rowcount, 2);
        assert!(outcome.columns.is_none());
    }

    #[test]
    fn declared_types_drive_conversion() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE t (stamp TIMESTAMP, flag BOOLEAN, doc JSON, note TEXT);
             INSERT INTO t VALUES ('2021-08-06 16:00:00', 1, '{\"k\":1}', 'plain');",
        )
        .unwrap();
        let outcome = run(&conn, "SELECT stamp, flag, doc, note FROM t").unwrap();
        assert_eq!(outcome.rowcount, 1);
        let row = &outcome.rows[0];
        assert!(matches!(row[0], RowValues::Timestamp(_)));
        assert_eq!(row[1], RowValues::Bool(true));
        assert_eq!(row[2], RowValues::JSON(serde_json::json!({"k": 1})));
        assert_eq!(row[3], RowValues::Text("plain".into()));
    }

    #[test]
    fn returning_rows_are_fetched() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);")
            .unwrap();
        let outcome = run(&conn, "INSERT INTO t (name) VALUES ('x') RETURNING \"id\"").unwrap();
        assert_eq!(outcome.rowcount, 1);
        assert_eq!(outcome.rows[0][0], RowValues::Int(1));
    }
}
