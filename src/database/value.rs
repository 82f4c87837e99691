//! Storage-level column values
//!
//! A closed set of value kinds, each able to render itself as SQLite
//! literal text and to be read back from a result column.

use rusqlite::types::ValueRef;

/// Declared kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Blob,
    OptionalText,
    OptionalBlob,
}

impl ColumnKind {
    pub fn is_optional(self) -> bool {
        matches!(self, ColumnKind::OptionalText | ColumnKind::OptionalBlob)
    }

    /// SQL type used in CREATE TABLE
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Text | ColumnKind::OptionalText => "VARCHAR",
            ColumnKind::Blob | ColumnKind::OptionalBlob => "BLOB",
        }
    }
}

/// A single column value
///
/// Text values hold raw bytes: identifier columns are TEXT but carry
/// arbitrary, non-UTF-8 byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Integer(i64),
    Text(Vec<u8>),
    Blob(Vec<u8>),
    OptionalText(Option<Vec<u8>>),
    OptionalBlob(Option<Vec<u8>>),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValue::Integer(_) => ColumnKind::Integer,
            ColumnValue::Text(_) => ColumnKind::Text,
            ColumnValue::Blob(_) => ColumnKind::Blob,
            ColumnValue::OptionalText(_) => ColumnKind::OptionalText,
            ColumnValue::OptionalBlob(_) => ColumnKind::OptionalBlob,
        }
    }

    /// Render as SQLite literal syntax
    pub fn to_literal(&self) -> String {
        match self {
            ColumnValue::Integer(value) => value.to_string(),
            ColumnValue::Text(bytes) => text_literal(bytes),
            ColumnValue::Blob(bytes) => blob_literal(bytes),
            ColumnValue::OptionalText(Some(bytes)) => text_literal(bytes),
            ColumnValue::OptionalBlob(Some(bytes)) => blob_literal(bytes),
            ColumnValue::OptionalText(None) | ColumnValue::OptionalBlob(None) => "NULL".to_string(),
        }
    }

    /// Read a result column as `kind`
    ///
    /// Returns `None` for NULL in a required column or a storage class
    /// that does not fit the kind.
    pub fn from_value_ref(kind: ColumnKind, value: ValueRef<'_>) -> Option<Self> {
        match (kind, value) {
            (ColumnKind::Integer, ValueRef::Integer(n)) => Some(ColumnValue::Integer(n)),
            (ColumnKind::Text, ValueRef::Text(bytes) | ValueRef::Blob(bytes)) => {
                Some(ColumnValue::Text(bytes.to_vec()))
            }
            (ColumnKind::Blob, ValueRef::Blob(bytes) | ValueRef::Text(bytes)) => {
                Some(ColumnValue::Blob(bytes.to_vec()))
            }
            (ColumnKind::OptionalText, ValueRef::Null) => Some(ColumnValue::OptionalText(None)),
            (ColumnKind::OptionalText, ValueRef::Text(bytes) | ValueRef::Blob(bytes)) => {
                Some(ColumnValue::OptionalText(Some(bytes.to_vec())))
            }
            (ColumnKind::OptionalBlob, ValueRef::Null) => Some(ColumnValue::OptionalBlob(None)),
            (ColumnKind::OptionalBlob, ValueRef::Blob(bytes) | ValueRef::Text(bytes)) => {
                Some(ColumnValue::OptionalBlob(Some(bytes.to_vec())))
            }
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Bytes of a present text or blob value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Text(bytes) | ColumnValue::Blob(bytes) => Some(bytes),
            ColumnValue::OptionalText(Some(bytes)) | ColumnValue::OptionalBlob(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// Quoted text, or a cast hex literal when the bytes are not plain UTF-8
fn text_literal(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => format!("'{}'", text.replace('\'', "''")),
        _ => format!("CAST({} AS TEXT)", blob_literal(bytes)),
    }
}

fn blob_literal(bytes: &[u8]) -> String {
    format!("X'{}'", hex::encode_upper(bytes))
}
