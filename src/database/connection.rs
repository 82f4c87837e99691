//! Database session
//!
//! Owns the engine handle for one wallet file. The handle is opened on
//! first use. Every insert and update is preceded by a file backup; if the
//! backup cannot be made the write is refused before the engine sees it.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use super::marshal::{Record, decode_row};
use super::queries::{self, Filter};
use super::record_id::{RecordID, filter_exact};
use super::schema;
use crate::backup::BackupManager;
use crate::error::{EngineStage, LayerOperation, Result, WalletError};

/// State of the engine handle
enum Handle {
    Unopened,
    Open(Connection),
    /// First open failed; the message is kept and never retried
    Failed(String),
}

/// An explicit transaction in flight
#[derive(Debug, Default)]
struct Transaction {
    /// A backup already covers this transaction
    backed_up: bool,
}

/// Database session wrapper
pub struct Database {
    /// Path to the database file
    path: PathBuf,
    /// SQLite connection
    handle: Handle,
    backups: BackupManager,
    transaction: Option<Transaction>,
}

impl Database {
    /// Session for an existing database; nothing is opened yet
    pub fn open(path: &Path, backups: BackupManager) -> Self {
        Self {
            path: path.to_path_buf(),
            handle: Handle::Unopened,
            backups,
            transaction: None,
        }
    }

    /// Create a new database with all tables
    pub fn create(path: &Path, backups: BackupManager) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| WalletError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        for sql in schema::create_all_tables() {
            conn.execute_batch(&sql)
                .map_err(|e| WalletError::engine(EngineStage::Exec, &e))?;
        }
        debug!(path = %path.display(), "database created");

        Ok(Self {
            path: path.to_path_buf(),
            handle: Handle::Open(conn),
            backups,
            transaction: None,
        })
    }

    /// Get the connection, opening it on first use
    pub fn connection(&mut self) -> Result<&Connection> {
        if matches!(self.handle, Handle::Unopened) {
            self.handle = match Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ) {
                Ok(conn) => {
                    debug!(path = %self.path.display(), "database opened");
                    Handle::Open(conn)
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "database open failed");
                    Handle::Failed(e.to_string())
                }
            };
        }

        match &self.handle {
            Handle::Open(conn) => Ok(conn),
            Handle::Failed(message) => Err(WalletError::OpenFailed {
                path: self.path.display().to_string(),
                message: message.clone(),
            }),
            Handle::Unopened => Err(WalletError::OpenFailed {
                path: self.path.display().to_string(),
                message: "database closed".to_string(),
            }),
        }
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Close the database connection
    ///
    /// A later call reopens it. An open transaction is rolled back by the
    /// engine.
    pub fn close(&mut self) {
        if matches!(self.handle, Handle::Open(_)) {
            self.handle = Handle::Unopened;
        }
        self.transaction = None;
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        matches!(self.handle, Handle::Open(_))
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch every row of `T` matching `filter`
    ///
    /// An id filter is narrowed to exact byte matches. Any row that does
    /// not decode fails the whole select.
    pub fn select<T: Record>(&mut self, filter: Option<&Filter>) -> Result<Vec<T>> {
        let sql = queries::select_sql::<T>(filter);
        debug!(sql = %sql, "select");

        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| WalletError::engine(EngineStage::Prepare, &e))?;

        let mut records = Vec::new();
        {
            let mut rows = stmt
                .query([])
                .map_err(|e| WalletError::engine(EngineStage::Step, &e))?;
            while let Some(row) = rows
                .next()
                .map_err(|e| WalletError::engine(EngineStage::Step, &e))?
            {
                match decode_row::<T>(row, 0)? {
                    Some(record) => records.push(record),
                    None => {
                        warn!(table = T::TABLE, row = records.len(), "row failed to decode");
                        return Err(WalletError::Decode {
                            table: T::TABLE,
                            row: records.len(),
                        });
                    }
                }
            }
        }
        stmt.finalize()
            .map_err(|e| WalletError::engine(EngineStage::Finalize, &e))?;

        Ok(match filter.and_then(Filter::exact_match) {
            Some((column, id)) => filter_exact(records, id, |record: &T| {
                record
                    .column_value(column)
                    .and_then(|value| value.as_bytes().map(RecordID::from))
            }),
            None => records,
        })
    }

    /// Fetch rows of `T` whose `column` equals `id`
    pub fn select_by_id<T: Record>(&mut self, column: &str, id: &RecordID) -> Result<Vec<T>> {
        self.select(Some(&Filter::id(column, id)))
    }

    /// Fetch the single row of `T` with primary key `id`
    pub fn find<T: Record>(&mut self, id: &RecordID) -> Result<Option<T>> {
        Ok(self
            .select_by_id::<T>(T::primary_key_column(), id)?
            .into_iter()
            .next())
    }

    /// Whether the file has a table named `name`
    ///
    /// Legacy wallets predate some tables.
    pub fn table_exists(&mut self, name: &str) -> Result<bool> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .map_err(|e| WalletError::engine(EngineStage::Prepare, &e))?;
        let count: i64 = stmt
            .query_row([name], |row| row.get(0))
            .map_err(|e| WalletError::engine(EngineStage::Step, &e))?;
        stmt.finalize()
            .map_err(|e| WalletError::engine(EngineStage::Finalize, &e))?;
        Ok(count > 0)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create the table for `T` if it is missing
    ///
    /// Schema changes are backed up like any other write.
    pub fn create_table<T: Record>(&mut self) -> Result<()> {
        if self.table_exists(T::TABLE)? {
            return Ok(());
        }
        self.ensure_backup(LayerOperation::Update)?;
        debug!(table = T::TABLE, "create table");
        self.exec_batch(&schema::create_table_sql::<T>())
    }

    /// Insert `record` after taking a backup
    pub fn insert<T: Record>(&mut self, record: &T) -> Result<()> {
        self.ensure_backup(LayerOperation::Insert)?;
        let sql = queries::insert_sql(record);
        debug!(table = T::TABLE, "insert");
        self.execute(&sql)?;
        Ok(())
    }

    /// Update `record` by primary key, writing only columns changed since
    /// `previous`
    ///
    /// Returns `false` without backing up or touching the engine when no
    /// column changed.
    pub fn update<T: Record>(&mut self, record: &T, previous: Option<&T>) -> Result<bool> {
        let Some(sql) = queries::update_sql(record, previous) else {
            debug!(table = T::TABLE, "update skipped, nothing changed");
            return Ok(false);
        };
        self.ensure_backup(LayerOperation::Update)?;
        debug!(table = T::TABLE, "update");
        self.execute(&sql)?;
        Ok(true)
    }

    /// Run one statement through prepare, step and finalize
    fn execute(&mut self, sql: &str) -> Result<usize> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WalletError::engine(EngineStage::Prepare, &e))?;
        let changed = stmt
            .execute([])
            .map_err(|e| WalletError::engine(EngineStage::Step, &e))?;
        stmt.finalize()
            .map_err(|e| WalletError::engine(EngineStage::Finalize, &e))?;
        Ok(changed)
    }

    /// Take a backup unless the current transaction already has one
    fn ensure_backup(&mut self, operation: LayerOperation) -> Result<()> {
        if self.transaction.as_ref().is_some_and(|t| t.backed_up) {
            return Ok(());
        }
        if let Err(e) = self.backups.create_backup(&self.path) {
            warn!(%operation, error = %e, "write refused, backup failed");
            return Err(e);
        }
        if let Some(transaction) = self.transaction.as_mut() {
            transaction.backed_up = true;
        }
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(WalletError::requirements(
                LayerOperation::BeginTransaction,
                "a transaction is already active",
            ));
        }
        self.exec_batch("BEGIN TRANSACTION")?;
        self.transaction = Some(Transaction::default());
        Ok(())
    }

    /// Commit a transaction
    ///
    /// On failure the transaction stays active so it can be rolled back.
    pub fn commit_transaction(&mut self) -> Result<()> {
        if self.transaction.is_none() {
            return Err(WalletError::requirements(
                LayerOperation::CommitTransaction,
                "no active transaction",
            ));
        }
        self.exec_batch("COMMIT")?;
        self.transaction = None;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if self.transaction.take().is_none() {
            return Err(WalletError::requirements(
                LayerOperation::RollbackTransaction,
                "no active transaction",
            ));
        }
        self.exec_batch("ROLLBACK")
    }

    /// Run `f` inside a transaction, committing on success and rolling
    /// back on error
    pub fn transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.begin_transaction()?;
        let result = f(self).and_then(|value| self.commit_transaction().map(|()| value));
        if let Err(e) = &result {
            if self.in_transaction() {
                if let Err(rollback) = self.rollback_transaction() {
                    warn!(error = %rollback, cause = %e, "rollback failed");
                }
            }
        }
        result
    }

    fn exec_batch(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "exec");
        self.connection()?
            .execute_batch(sql)
            .map_err(|e| WalletError::engine(EngineStage::Exec, &e))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}
