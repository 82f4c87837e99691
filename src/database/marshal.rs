//! Generic record marshalling
//!
//! Each entity declares its table and an ordered column list. One routine
//! reads those columns from a result row and hands them to the entity's
//! decoder; the encoder produces values in the same order.

use rusqlite::Row;

use super::record_id::RecordID;
use super::value::{ColumnKind, ColumnValue};
use crate::error::{EngineStage, Result, WalletError};

/// A declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// A typed row of one table
pub trait Record: Sized {
    /// Table name
    const TABLE: &'static str;

    /// Columns in storage order
    const COLUMNS: &'static [Column];

    /// Index of the primary key in `COLUMNS`
    const PRIMARY_KEY: usize = 0;

    /// Build a record from values in `COLUMNS` order
    ///
    /// Returns `None` if any value has the wrong kind.
    fn decode(columns: &mut Columns) -> Option<Self>;

    /// Values for every column in `COLUMNS` order
    fn encode(&self) -> Vec<ColumnValue>;

    /// Name of the primary key column
    fn primary_key_column() -> &'static str {
        Self::COLUMNS[Self::PRIMARY_KEY].name
    }

    /// Position of a column by name
    fn column_index(name: &str) -> Option<usize> {
        Self::COLUMNS.iter().position(|column| column.name == name)
    }

    /// Encoded value of one column
    fn column_value(&self, name: &str) -> Option<ColumnValue> {
        let index = Self::column_index(name)?;
        self.encode().into_iter().nth(index)
    }
}

/// Sequential reader over decoded column values
#[derive(Debug)]
pub struct Columns {
    values: std::vec::IntoIter<ColumnValue>,
}

impl Columns {
    pub fn new(values: Vec<ColumnValue>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    /// Next value as a field of type `F`
    pub fn take<F: ColumnField>(&mut self) -> Option<F> {
        F::from_value(self.values.next()?)
    }

    /// Consume a column the domain model does not track
    pub fn skip(&mut self) -> Option<()> {
        self.values.next().map(|_| ())
    }
}

/// A record field stored in a single column
pub trait ColumnField: Sized {
    /// `None` when the value's kind cannot hold this field
    fn from_value(value: ColumnValue) -> Option<Self>;

    /// Value of this field stored as `kind`
    fn to_value(&self, kind: ColumnKind) -> ColumnValue;
}

impl ColumnField for i64 {
    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Integer(n) => Some(n),
            _ => None,
        }
    }

    fn to_value(&self, _kind: ColumnKind) -> ColumnValue {
        ColumnValue::Integer(*self)
    }
}

impl ColumnField for RecordID {
    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Text(bytes) => Some(RecordID::from(bytes)),
            _ => None,
        }
    }

    fn to_value(&self, _kind: ColumnKind) -> ColumnValue {
        self.clone().into()
    }
}

/// Text column holding UTF-8
impl ColumnField for String {
    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Text(bytes) => String::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    fn to_value(&self, _kind: ColumnKind) -> ColumnValue {
        ColumnValue::Text(self.clone().into_bytes())
    }
}

impl ColumnField for Vec<u8> {
    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Text(bytes) | ColumnValue::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn to_value(&self, kind: ColumnKind) -> ColumnValue {
        match kind {
            ColumnKind::Text => ColumnValue::Text(self.clone()),
            _ => ColumnValue::Blob(self.clone()),
        }
    }
}

impl ColumnField for Option<Vec<u8>> {
    fn from_value(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::OptionalText(bytes) | ColumnValue::OptionalBlob(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn to_value(&self, kind: ColumnKind) -> ColumnValue {
        match kind {
            ColumnKind::OptionalText => ColumnValue::OptionalText(self.clone()),
            _ => ColumnValue::OptionalBlob(self.clone()),
        }
    }
}

/// Implement [`Record`] from one ordered column list
///
/// Each entry is `"column": Kind => field` for a tracked field, or
/// `"column": Kind = value` for a column the model does not track; the
/// value is written on encode and the stored one skipped on decode.
macro_rules! impl_record {
    (@read $columns:ident, $field:ident) => {
        let $field = $columns.take()?;
    };
    (@read $columns:ident) => {
        $columns.skip()?;
    };
    (@write $record:ident, $kind:ident, $field:ident) => {
        $crate::database::marshal::ColumnField::to_value(
            &$record.$field,
            $crate::database::value::ColumnKind::$kind,
        )
    };
    (@write $record:ident, $kind:ident; $placeholder:expr) => {
        $placeholder
    };
    ($ty:ty, $table:literal, [
        $( $column:literal : $kind:ident $(=> $field:ident)? $(= $placeholder:expr)? ),+ $(,)?
    ]) => {
        impl $crate::database::marshal::Record for $ty {
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [$crate::database::marshal::Column] = &[
                $( $crate::database::marshal::Column::new(
                    $column,
                    $crate::database::value::ColumnKind::$kind,
                ) ),+
            ];

            fn decode(columns: &mut $crate::database::marshal::Columns) -> Option<Self> {
                $( impl_record!(@read columns $(, $field)?); )+
                Some(Self { $( $( $field, )? )+ })
            }

            fn encode(&self) -> Vec<$crate::database::value::ColumnValue> {
                vec![ $( impl_record!(@write self, $kind $(, $field)? $(; $placeholder)?) ),+ ]
            }
        }
    };
}

pub(crate) use impl_record;

/// Decode `T` from `row`, starting at column `start`
///
/// `Ok(None)` means the row is malformed for `T`: a required column is
/// NULL or holds an unexpected storage class. No partial record is built.
pub fn decode_row<T: Record>(row: &Row<'_>, start: usize) -> Result<Option<T>> {
    let mut values = Vec::with_capacity(T::COLUMNS.len());
    for (offset, column) in T::COLUMNS.iter().enumerate() {
        let raw = row
            .get_ref(start + offset)
            .map_err(|e| WalletError::engine(EngineStage::Step, &e))?;
        match ColumnValue::from_value_ref(column.kind, raw) {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }
    Ok(T::decode(&mut Columns::new(values)))
}

/// Column names quoted and joined for a SELECT or INSERT list
pub fn column_list<T: Record>() -> String {
    T::COLUMNS
        .iter()
        .map(|column| format!("\"{}\"", column.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        id: RecordID,
        label: Vec<u8>,
        note: Option<Vec<u8>>,
        count: i64,
    }

    impl_record!(Sample, "sample", [
        "id": Text => id,
        "label": Blob => label,
        "reserved": Blob = ColumnValue::Blob(vec![0]),
        "note": OptionalBlob => note,
        "count": Integer => count,
    ]);

    fn decode_sql(sql: &str, start: usize) -> Option<Sample> {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.query_row(sql, [], |row| Ok(decode_row::<Sample>(row, start).unwrap()))
            .unwrap()
    }

    #[test]
    fn test_decode_row() {
        let sample = decode_sql("SELECT CAST(X'01FF' AS TEXT), X'AA', X'EE', NULL, 5", 0).unwrap();
        assert_eq!(sample.id, RecordID::new(vec![0x01, 0xff]));
        assert_eq!(sample.label, vec![0xaa]);
        assert_eq!(sample.note, None);
        assert_eq!(sample.count, 5);
    }

    #[test]
    fn test_decode_row_with_offset() {
        let sample = decode_sql("SELECT 'ignored', 'ab', X'', X'', X'01', -1", 1).unwrap();
        assert_eq!(sample.id, RecordID::new(b"ab".to_vec()));
        assert_eq!(sample.label, Vec::<u8>::new());
        assert_eq!(sample.note, Some(vec![1]));
        assert_eq!(sample.count, -1);
    }

    #[test]
    fn test_decode_row_missing_required() {
        assert!(decode_sql("SELECT NULL, X'AA', X'', NULL, 5", 0).is_none());
        assert!(decode_sql("SELECT 'id', X'AA', X'', NULL, NULL", 0).is_none());
        assert!(decode_sql("SELECT 'id', X'AA', X'', NULL, 'five'", 0).is_none());
    }

    #[test]
    fn test_columns_reader_kind_mismatch() {
        let mut columns = Columns::new(vec![ColumnValue::Integer(1)]);
        assert!(columns.take::<Vec<u8>>().is_none());
        // Reader is exhausted afterwards
        assert!(columns.skip().is_none());
    }

    #[test]
    fn test_column_helpers() {
        assert_eq!(Sample::primary_key_column(), "id");
        assert_eq!(Sample::column_index("count"), Some(4));
        assert_eq!(Sample::column_index("missing"), None);
        assert_eq!(
            column_list::<Sample>(),
            "\"id\", \"label\", \"reserved\", \"note\", \"count\""
        );

        let sample = Sample {
            id: RecordID::new(b"x".to_vec()),
            label: vec![],
            note: None,
            count: 9,
        };
        assert_eq!(sample.column_value("count"), Some(ColumnValue::Integer(9)));
    }
}
