//! Database schema definitions
//!
//! DDL is generated from each record's declared columns so the stored
//! layout and the marshalling code cannot drift apart.

use super::marshal::Record;
use super::models::{
    Card, CardAttachment, CardFieldValue, Category, DatabaseMetadata, DatabaseVersion, Icon, Template,
    TemplateField, TemplateFieldType, WalletInfo,
};

/// CREATE TABLE statement for `T`
pub fn create_table_sql<T: Record>() -> String {
    let columns = T::COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let mut definition = format!("    \"{}\" {}", column.name, column.kind.sql_type());
            if index == T::PRIMARY_KEY {
                definition.push_str(" NOT NULL PRIMARY KEY");
            } else if !column.kind.is_optional() {
                definition.push_str(" NOT NULL");
            }
            definition
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS \"{}\" (\n{}\n)", T::TABLE, columns)
}

/// All table creation statements in order
pub fn create_all_tables() -> Vec<String> {
    vec![
        create_table_sql::<DatabaseVersion>(),
        create_table_sql::<DatabaseMetadata>(),
        create_table_sql::<WalletInfo>(),
        create_table_sql::<TemplateFieldType>(),
        create_table_sql::<Template>(),
        create_table_sql::<TemplateField>(),
        create_table_sql::<Icon>(),
        create_table_sql::<Category>(),
        create_table_sql::<Card>(),
        create_table_sql::<CardFieldValue>(),
        create_table_sql::<CardAttachment>(),
    ]
}

/// Field types seeded into a new wallet: (id, name, priority)
pub const DEFAULT_FIELD_TYPES: &[(i64, &str, i64)] = &[
    (1, "text", 0),
    (2, "password", 1),
    (3, "url", 2),
    (4, "email", 3),
    (5, "phone", 4),
    (6, "date", 5),
    (7, "number", 6),
    (8, "note", 7),
];
