//! SQL statement text for record access
//!
//! Statements are built as literal text from encoded column values. The
//! session executes them; nothing here touches the engine.

use super::marshal::{Record, column_list};
use super::record_id::RecordID;
use super::value::ColumnValue;

/// Row restriction for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Raw SQL condition, used as-is
    Condition(String),
    /// Rows whose `column` holds `id`
    ///
    /// Built from [`RecordID::match_condition`]; results are narrowed to
    /// exact byte matches after the query runs.
    Id { column: String, id: RecordID },
}

impl Filter {
    pub fn condition(sql: impl Into<String>) -> Self {
        Filter::Condition(sql.into())
    }

    pub fn id(column: impl Into<String>, id: &RecordID) -> Self {
        Filter::Id {
            column: column.into(),
            id: id.clone(),
        }
    }

    /// WHERE clause body
    pub fn to_sql(&self) -> String {
        match self {
            Filter::Condition(sql) => sql.clone(),
            Filter::Id { column, id } => id.match_condition(column),
        }
    }

    /// Column and id that results must equal exactly, if any
    pub fn exact_match(&self) -> Option<(&str, &RecordID)> {
        match self {
            Filter::Condition(_) => None,
            Filter::Id { column, id } => Some((column.as_str(), id)),
        }
    }
}

// ============================================================================
// Statement builders
// ============================================================================

/// SELECT every declared column of `T`
pub fn select_sql<T: Record>(filter: Option<&Filter>) -> String {
    let mut sql = format!("SELECT {} FROM \"{}\"", column_list::<T>(), T::TABLE);
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.to_sql());
    }
    sql
}

/// INSERT `record` with a literal for every column
pub fn insert_sql<T: Record>(record: &T) -> String {
    let values = record
        .encode()
        .iter()
        .map(ColumnValue::to_literal)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        T::TABLE,
        column_list::<T>(),
        values
    )
}

/// UPDATE `record` by primary key
///
/// With a `previous` snapshot only the columns whose encoded value differs
/// are written. The primary key is never in the SET list. Returns `None`
/// when there is nothing to write.
pub fn update_sql<T: Record>(record: &T, previous: Option<&T>) -> Option<String> {
    let current = record.encode();
    let before = previous.map(T::encode);

    let assignments = T::COLUMNS
        .iter()
        .zip(&current)
        .enumerate()
        .filter(|(index, _)| *index != T::PRIMARY_KEY)
        .filter(|(index, (_, value))| match &before {
            Some(before) => before.get(*index) != Some(*value),
            None => true,
        })
        .map(|(_, (column, value))| format!("\"{}\" = {}", column.name, value.to_literal()))
        .collect::<Vec<_>>();

    if assignments.is_empty() {
        return None;
    }

    let key = current.get(T::PRIMARY_KEY)?;
    Some(format!(
        "UPDATE \"{}\" SET {} WHERE \"{}\" = {}",
        T::TABLE,
        assignments.join(", "),
        T::primary_key_column(),
        key.to_literal()
    ))
}
