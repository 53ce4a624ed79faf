//! Column accessors shared by the repositories.
//!
//! Each accessor reports a human-readable reason on mismatch; callers wrap it
//! into `Error::InvalidRecord` together with the table and row id.

use libsql::{Row, Value};

pub type ColumnResult<T> = std::result::Result<T, String>;

fn value(row: &Row, idx: i32) -> ColumnResult<Value> {
    row.get_value(idx)
        .map_err(|error| format!("column {idx}: {error}"))
}

pub fn text(row: &Row, idx: i32) -> ColumnResult<String> {
    match value(row, idx)? {
        Value::Text(text) => Ok(text),
        other => Err(format!("column {idx}: expected text, got {other:?}")),
    }
}

pub fn opt_text(row: &Row, idx: i32) -> ColumnResult<Option<String>> {
    match value(row, idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(format!("column {idx}: expected text, got {other:?}")),
    }
}

pub fn integer(row: &Row, idx: i32) -> ColumnResult<i64> {
    match value(row, idx)? {
        Value::Integer(number) => Ok(number),
        other => Err(format!("column {idx}: expected integer, got {other:?}")),
    }
}

pub fn opt_integer(row: &Row, idx: i32) -> ColumnResult<Option<i64>> {
    match value(row, idx)? {
        Value::Null => Ok(None),
        Value::Integer(number) => Ok(Some(number)),
        other => Err(format!("column {idx}: expected integer, got {other:?}")),
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn opt_real(row: &Row, idx: i32) -> ColumnResult<Option<f64>> {
    match value(row, idx)? {
        Value::Null => Ok(None),
        Value::Real(number) => Ok(Some(number)),
        Value::Integer(number) => Ok(Some(number as f64)),
        other => Err(format!("column {idx}: expected real, got {other:?}")),
    }
}

pub fn flag(row: &Row, idx: i32) -> ColumnResult<bool> {
    integer(row, idx).map(|value| value != 0)
}

pub fn unsigned(row: &Row, idx: i32) -> ColumnResult<u32> {
    let number = integer(row, idx)?;
    u32::try_from(number).map_err(|_| format!("column {idx}: {number} is out of range"))
}

pub fn opt_unsigned(row: &Row, idx: i32) -> ColumnResult<Option<u32>> {
    opt_integer(row, idx)?
        .map(|number| {
            u32::try_from(number).map_err(|_| format!("column {idx}: {number} is out of range"))
        })
        .transpose()
}

/// Bind an optional value, mapping `None` to SQL `NULL`.
pub fn nullable<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}
