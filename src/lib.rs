//! # SWL Wallet Core
//!
//! Encrypted record store for `.swl` password wallets.
//!
//! ## Features
//!
//! - Legacy AES-256-ECB and AES-256-CBC (SHA-256 or PBKDF2 keys) ciphers
//! - Opaque byte-string record ids with LIKE lookup and exact post-filtering
//! - Declarative record marshalling over SQLite
//! - A backup of the wallet file before every write
//! - One-time upgrade of legacy wallets to PBKDF2 encryption
//!
//! ## Example
//!
//! ```no_run
//! use swlcore::{RecordID, Wallet, WalletConfig};
//!
//! let config = WalletConfig::from_file(std::path::Path::new("wallet.json")).unwrap();
//! let mut wallet = Wallet::open(&config).unwrap();
//! wallet.unlock("my_password").unwrap();
//!
//! for category in wallet.categories(&RecordID::root()).unwrap() {
//!     println!("{}: {}", category.id, wallet.decrypt_text(&category.name).unwrap());
//! }
//! ```

pub mod crypto;
pub mod database;
pub mod business;
pub mod backup;
pub mod config;
pub mod error;

// Re-export main types
pub use error::{WalletError, Result};
pub use config::WalletConfig;
pub use crypto::{Cipher, CipherProvider, CipherScheme};
pub use database::{Database, Filter, RecordID};
pub use business::Wallet;
pub use backup::{BackupInfo, BackupManager};

/// Wallet file extension
pub const WALLET_EXTENSION: &str = "swl";

/// Backup file extension
pub const BACKUP_EXTENSION: &str = "bak";

/// Schema version written into new wallets
pub const DATABASE_VERSION: i64 = 1;

/// Sync counter for rows created outside any sync
pub const LEGACY_SYNC_ID: i64 = -1;

/// Default PBKDF2 calibration target in milliseconds
pub const DEFAULT_CALIBRATION_MS: u64 = 1000;

/// Default PBKDF2 salt length in bytes
pub const DEFAULT_SALT_LEN: usize = 16;
