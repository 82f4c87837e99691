//! Opaque record identifiers
//!
//! A `RecordID` is a raw byte string, historically a 64-bit value, stored
//! in a TEXT column without any UTF-8 guarantee. SQLite's text functions
//! cannot express every byte value, so lookups go through a LIKE pattern
//! that always matches the real id but may also match others. Results
//! must then be narrowed with [`filter_exact`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::value::ColumnValue;

/// Number of bytes in a generated identifier
pub const RECORD_ID_LENGTH: usize = 8;

/// Byte-string primary key; the empty id is the root container
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordID(Vec<u8>);

/// One piece of a match pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fragment {
    Exact(u8),
    AnyOne,
    AnyMany,
}

impl RecordID {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The distinguished root id
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A fresh random id
    pub fn generate() -> Self {
        let bytes: [u8; RECORD_ID_LENGTH] = rand::random();
        Self(bytes.to_vec())
    }

    /// Id encoding `value` as little-endian bytes
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_le_bytes().to_vec())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Little-endian accumulation of the first eight bytes
    ///
    /// Informational only; equality is always byte-exact.
    pub fn numeric_value(&self) -> u64 {
        self.0
            .iter()
            .take(8)
            .enumerate()
            .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (8 * i)))
    }

    /// SQL condition on `column` that matches this id, possibly among others
    pub fn match_condition(&self, column: &str) -> String {
        format!("\"{}\" LIKE {}", column, self.match_pattern())
    }

    /// The LIKE pattern expression on its own
    pub fn match_pattern(&self) -> String {
        let fragments = self.fragments();
        if fragments.is_empty() {
            return "''".to_string();
        }
        fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Exact(b) => format!("char({})", b),
                Fragment::AnyOne => "'_'".to_string(),
                Fragment::AnyMany => "'%'".to_string(),
            })
            .collect::<Vec<_>>()
            .join("||")
    }

    fn fragments(&self) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = Vec::with_capacity(self.0.len());
        for &b in &self.0 {
            if is_encodable(b) {
                fragments.push(Fragment::Exact(b));
                continue;
            }
            match fragments.last().copied() {
                // Absorbed by the preceding multi-character wildcard
                Some(Fragment::AnyMany) => {}
                // Adjacent high bytes may form one character
                Some(Fragment::AnyOne) => {
                    fragments.pop();
                    fragments.push(Fragment::AnyMany);
                }
                _ => fragments.push(Fragment::AnyOne),
            }
        }
        fragments
    }
}

/// Bytes that can be matched literally with `char(b)`
fn is_encodable(b: u8) -> bool {
    b < 128 && b != b'%' && b != b'{'
}

/// Keep only records whose id equals `id` byte for byte
///
/// Required after any query built from [`RecordID::match_condition`].
pub fn filter_exact<T, F>(records: Vec<T>, id: &RecordID, key: F) -> Vec<T>
where
    F: Fn(&T) -> Option<RecordID>,
{
    records
        .into_iter()
        .filter(|record| key(record).as_ref() == Some(id))
        .collect()
}

impl From<Vec<u8>> for RecordID {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RecordID {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<RecordID> for ColumnValue {
    fn from(id: RecordID) -> Self {
        ColumnValue::Text(id.0)
    }
}

impl fmt::Display for RecordID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&hex::encode(&self.0))
        }
    }
}

impl Serialize for RecordID {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for RecordID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text)
            .map(RecordID)
            .map_err(serde::de::Error::custom)
    }
}
