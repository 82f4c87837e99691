//! Error types for the SWL wallet core

use std::fmt;
use thiserror::Error;

/// Text used when the engine reports a failure but gives no message
pub const NO_ERROR_DETAIL: &str = "failed without error detail";

/// Stage of a statement's lifecycle at which the engine failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStage {
    Prepare,
    Step,
    Finalize,
    Exec,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineStage::Prepare => "prepare",
            EngineStage::Step => "step",
            EngineStage::Finalize => "finalize",
            EngineStage::Exec => "exec",
        })
    }
}

/// Session operation that refused or failed at the layer level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOperation {
    Insert,
    Update,
    Backup,
    BeginTransaction,
    CommitTransaction,
    RollbackTransaction,
}

impl fmt::Display for LayerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerOperation::Insert => "insert",
            LayerOperation::Update => "update",
            LayerOperation::Backup => "backup",
            LayerOperation::BeginTransaction => "begin-transaction",
            LayerOperation::CommitTransaction => "commit-transaction",
            LayerOperation::RollbackTransaction => "rollback-transaction",
        })
    }
}

/// Kind of a layer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerErrorKind {
    /// A precondition of the operation was violated by the caller
    Requirements,
    /// The operation was attempted and failed
    General,
}

impl fmt::Display for LayerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerErrorKind::Requirements => "requirements",
            LayerErrorKind::General => "general",
        })
    }
}

/// Main error type for wallet operations
#[derive(Error, Debug)]
pub enum WalletError {
    /// The SQL engine failed at a given statement stage
    #[error("Engine {stage} error: {message}")]
    Engine { stage: EngineStage, message: String },

    /// The session layer refused or failed an operation
    #[error("{operation} {kind} error: {message}")]
    Layer {
        operation: LayerOperation,
        kind: LayerErrorKind,
        message: String,
    },

    /// The engine handle could not be opened
    #[error("Cannot open database {path}: {message}")]
    OpenFailed { path: String, message: String },

    /// A result row could not be turned into a record
    #[error("Malformed {table} row {row}")]
    Decode { table: &'static str, row: usize },

    /// Wallet is locked, unlock required before operation
    #[error("Wallet is locked")]
    Locked,

    /// Encryption failed
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    /// Decryption failed - wrong key or corrupted data
    #[error("Decryption error: {0}")]
    DecryptionError(String),

    /// Key derivation parameters were rejected
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WalletError {
    /// Build an engine error from a rusqlite failure
    pub fn engine(stage: EngineStage, err: &rusqlite::Error) -> Self {
        WalletError::Engine {
            stage,
            message: engine_message(err),
        }
    }

    /// Build a precondition error for a session operation
    pub fn requirements(operation: LayerOperation, message: impl Into<String>) -> Self {
        WalletError::Layer {
            operation,
            kind: LayerErrorKind::Requirements,
            message: message.into(),
        }
    }

    /// Build a general failure for a session operation
    pub fn general(operation: LayerOperation, message: impl Into<String>) -> Self {
        WalletError::Layer {
            operation,
            kind: LayerErrorKind::General,
            message: message.into(),
        }
    }

    /// Engine stage, if this is an engine error
    pub fn stage(&self) -> Option<EngineStage> {
        match self {
            WalletError::Engine { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Operation and kind, if this is a layer error
    pub fn layer(&self) -> Option<(LayerOperation, LayerErrorKind)> {
        match self {
            WalletError::Layer { operation, kind, .. } => Some((*operation, *kind)),
            _ => None,
        }
    }
}

/// Extract the engine's own error text
fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) if !message.is_empty() => message.clone(),
        rusqlite::Error::SqliteFailure(_, _) => NO_ERROR_DETAIL.to_string(),
        other => {
            let text = other.to_string();
            if text.is_empty() {
                NO_ERROR_DETAIL.to_string()
            } else {
                text
            }
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Config(err.to_string())
    }
}

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;
