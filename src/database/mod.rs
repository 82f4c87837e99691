//! Database layer for SWL wallets
//!
//! Handles SQLite access for encrypted records:
//! - Opaque record identifiers and their lookup conditions
//! - Typed column values and declarative record marshalling
//! - Schema creation and statement building
//! - The session with transactions and backup-gated writes

pub mod record_id;
pub mod value;
pub mod marshal;
pub mod models;
pub mod schema;
pub mod queries;
pub mod connection;

pub use connection::Database;
pub use marshal::{Column, ColumnField, Columns, Record};
pub use models::*;
pub use queries::Filter;
pub use record_id::{RecordID, filter_exact};
pub use value::{ColumnKind, ColumnValue};
