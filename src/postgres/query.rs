use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ::postgres::types::Type;
use ::postgres::{Client, Row, SimpleQueryMessage};
use serde_json::Value;

use crate::cursor::Outcome;
use crate::error::RawlError;
use crate::types::RowValues;

/// Run one fully rendered statement.
///
/// Statements without result columns report the affected row count; everything else
/// is fetched in full. Result sets whose column types all have a binary decoder are
/// read over the extended protocol. Any other type (numeric, uuid, interval, arrays
/// and so on) sends the statement through the simple protocol instead and every
/// value is parsed from its text form.
pub(crate) fn run(client: &mut Client, sql: &str) -> Result<Outcome, RawlError> {
    let stmt = client.prepare(sql)?;
    if stmt.columns().is_empty() {
        let affected = client.execute(&stmt, &[])?;
        return Ok(Outcome::affected(affected));
    }

    let columns: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    if !stmt.columns().iter().all(|col| decodes_binary(col.type_())) {
        let types: Vec<Type> = stmt.columns().iter().map(|col| col.type_().clone()).collect();
        let values = run_text(client, sql, &types)?;
        return Ok(Outcome::fetched(columns, values));
    }

    let rows = client.query(&stmt, &[])?;
    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut row_values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            row_values.push(extract_value(row, idx)?);
        }
        values.push(row_values);
    }
    Ok(Outcome::fetched(columns, values))
}

fn is_text(ty: &Type) -> bool {
    [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN].contains(ty)
}

fn decodes_binary(ty: &Type) -> bool {
    is_text(ty)
        || [
            Type::INT2,
            Type::INT4,
            Type::INT8,
            Type::FLOAT4,
            Type::FLOAT8,
            Type::BOOL,
            Type::TIMESTAMP,
            Type::TIMESTAMPTZ,
            Type::DATE,
            Type::JSON,
            Type::JSONB,
            Type::BYTEA,
        ]
        .contains(ty)
}

fn run_text(
    client: &mut Client,
    sql: &str,
    types: &[Type],
) -> Result<Vec<Vec<RowValues>>, RawlError> {
    let mut values = Vec::new();
    for message in client.simple_query(sql)? {
        if let SimpleQueryMessage::Row(row) = message {
            let mut row_values = Vec::with_capacity(types.len());
            for (idx, ty) in types.iter().enumerate() {
                row_values.push(parse_text(ty, row.try_get(idx)?));
            }
            values.push(row_values);
        }
    }
    Ok(values)
}

/// Convert a value in Postgres text output format; unparsable text stays text.
fn parse_text(ty: &Type, text: Option<&str>) -> RowValues {
    let Some(text) = text else {
        return RowValues::Null;
    };
    let fallback = || RowValues::Text(text.to_string());

    if [Type::INT2, Type::INT4, Type::INT8].contains(ty) {
        text.parse().map_or_else(|_| fallback(), RowValues::Int)
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        text.parse().map_or_else(|_| fallback(), RowValues::Float)
    } else if *ty == Type::BOOL {
        match text {
            "t" => RowValues::Bool(true),
            "f" => RowValues::Bool(false),
            _ => fallback(),
        }
    } else if *ty == Type::TIMESTAMP {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map_or_else(|_| fallback(), RowValues::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .map_or_else(|_| fallback(), |ts| RowValues::Timestamp(ts.naive_utc()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        serde_json::from_str(text).map_or_else(|_| fallback(), RowValues::JSON)
    } else if *ty == Type::BYTEA {
        text.strip_prefix("\\x")
            .and_then(decode_hex)
            .map_or_else(fallback, RowValues::Blob)
    } else {
        fallback()
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Convert one column of a Postgres row into a [`RowValues`].
fn extract_value(row: &Row, idx: usize) -> Result<RowValues, RawlError> {
    let ty = row.columns()[idx].type_();

    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob)
    } else if is_text(ty) {
        row.try_get::<_, Option<String>>(idx)?
            .map_or(RowValues::Null, RowValues::Text)
    } else {
        return Err(RawlError::ParameterError(format!(
            "column {idx} has type {} with no binary decoder",
            ty.name()
        )));
    };
    Ok(value)
}
