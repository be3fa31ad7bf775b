//! Type-checked access to stored columns.
//!
//! `SQLite` keeps whatever storage class a value was written with, whatever
//! the declared column type. Rows are copied out as [`Value`]s first and
//! checked while decoding, so a wrongly typed cell makes that one row
//! undecodable instead of failing the whole query.

use rusqlite::types::{Value, ValueRef};

/// Copies a cell without interpreting it. Text that isn't UTF-8 is kept as a blob.
pub(crate) fn owned(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map_or_else(|err| Value::Blob(err.into_bytes()), Value::Text),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

pub(crate) fn text(value: Value, column: &str) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(format!("{column} holds {}, expected UTF-8 text", other.data_type())),
    }
}

pub(crate) fn integer(value: Value, column: &str) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(n) => Ok(Some(n)),
        other => Err(format!("{column} holds {}, expected an integer", other.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_text_is_rejected_as_text() {
        let value = owned(ValueRef::Text(&[0x00, 0xFF]));
        assert_eq!(value, Value::Blob(vec![0x00, 0xFF]));
        assert_eq!(
            text(value, "command").unwrap_err(),
            "command holds Blob, expected UTF-8 text"
        );
    }

    #[test]
    fn null_is_absent_for_either_type() {
        assert_eq!(text(Value::Null, "cwd"), Ok(None));
        assert_eq!(integer(Value::Null, "exit_code"), Ok(None));
    }

    #[test]
    fn integer_rejects_text() {
        let err = integer(owned(ValueRef::Text(b"oops")), "exit_code").unwrap_err();
        assert_eq!(err, "exit_code holds Text, expected an integer");
        assert_eq!(integer(Value::Integer(3), "exit_code"), Ok(Some(3)));
    }
}
