//! Wallet configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};
use crate::{DEFAULT_CALIBRATION_MS, DEFAULT_SALT_LEN, WALLET_EXTENSION};

/// Default backup folder name under the storage root
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Where a wallet lives and how it is maintained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Wallet database file
    pub database_path: PathBuf,
    /// Managed storage area; the database must live inside it to be written
    pub storage_root: PathBuf,
    /// Backup folder name under `storage_root`
    pub backup_dir: String,
    /// Number of backups to keep; unlimited when absent
    pub max_backups: Option<usize>,
    /// Target PBKDF2 duration when (re)encrypting a wallet
    pub calibration_ms: u64,
    /// PBKDF2 salt length in bytes
    pub salt_len: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(format!("wallet.{}", WALLET_EXTENSION)),
            storage_root: PathBuf::from("."),
            backup_dir: DEFAULT_BACKUP_DIR.to_string(),
            max_backups: None,
            calibration_ms: DEFAULT_CALIBRATION_MS,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

impl WalletConfig {
    /// Configuration for a wallet file stored directly in `storage_root`
    pub fn new(storage_root: &Path, wallet_name: &str) -> Self {
        Self {
            database_path: storage_root.join(format!("{}.{}", wallet_name, WALLET_EXTENSION)),
            storage_root: storage_root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.backup_dir.is_empty() {
            return Err(WalletError::Config("backup_dir must not be empty".to_string()));
        }
        if self.salt_len == 0 {
            return Err(WalletError::Config("salt_len must be positive".to_string()));
        }
        if self.max_backups == Some(0) {
            return Err(WalletError::Config("max_backups must be at least 1".to_string()));
        }
        Ok(())
    }
}
