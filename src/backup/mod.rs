//! Pre-mutation backups
//!
//! Before any write the session copies the live wallet file into a backup
//! folder under the managed storage area. Backups are plain file copies
//! named `<stem>-YYYYMMDD-HHMMSS[-n].bak` and are never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{info, warn};

use crate::BACKUP_EXTENSION;
use crate::config::WalletConfig;
use crate::error::{LayerOperation, Result, WalletError};

/// Backup date format
pub const BACKUP_DATE_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Name attempts per second before giving up
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Backup manager
#[derive(Debug, Clone)]
pub struct BackupManager {
    /// Managed storage area; only files inside it are backed up
    storage_root: PathBuf,
    /// Backup folder path
    folder: PathBuf,
    /// Number of backups to retain, if limited
    max_backups: Option<usize>,
}

impl BackupManager {
    /// Create a backup manager storing into `storage_root/backup_dir`
    pub fn new(storage_root: &Path, backup_dir: &str) -> Self {
        Self {
            storage_root: storage_root.to_path_buf(),
            folder: storage_root.join(backup_dir),
            max_backups: None,
        }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(&config.storage_root, &config.backup_dir).with_max_backups(config.max_backups)
    }

    /// Prune to `max_backups` after each backup
    pub fn with_max_backups(mut self, max_backups: Option<usize>) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Get the backup folder path
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Whether `path` lies inside the managed storage area
    ///
    /// A file that does not exist yet is judged by its parent directory.
    pub fn is_managed(&self, path: &Path) -> bool {
        let Ok(root) = self.storage_root.canonicalize() else {
            return false;
        };
        let resolved = if path.exists() {
            path.canonicalize().ok()
        } else {
            match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) => parent.canonicalize().ok().map(|dir| dir.join(name)),
                _ => None,
            }
        };
        resolved.is_some_and(|path| path.starts_with(root))
    }

    /// Refuse `db_path` unless backups of it can be taken
    pub fn check_managed(&self, db_path: &Path) -> Result<()> {
        if self.is_managed(db_path) {
            return Ok(());
        }
        Err(WalletError::requirements(
            LayerOperation::Backup,
            format!(
                "{} is outside the storage area {}",
                db_path.display(),
                self.storage_root.display()
            ),
        ))
    }

    /// Copy `db_path` to a new backup file
    ///
    /// Fails with a requirements error if the file is missing or outside
    /// the storage area, and with a general error if the copy fails.
    pub fn create_backup(&self, db_path: &Path) -> Result<PathBuf> {
        if !db_path.is_file() {
            return Err(WalletError::requirements(
                LayerOperation::Backup,
                format!("database file not found: {}", db_path.display()),
            ));
        }
        self.check_managed(db_path)?;

        fs::create_dir_all(&self.folder).map_err(|e| {
            WalletError::general(LayerOperation::Backup, format!("Failed to create backup folder: {}", e))
        })?;

        let stem = backup_stem(db_path);
        let (backup_path, mut target) = self.create_unique(stem)?;

        let copied = File::open(db_path).and_then(|mut source| io::copy(&mut source, &mut target));
        if let Err(e) = copied.and_then(|_| target.sync_all()) {
            drop(target);
            let _ = fs::remove_file(&backup_path);
            return Err(WalletError::general(
                LayerOperation::Backup,
                format!("Failed to copy database: {}", e),
            ));
        }

        info!(path = %backup_path.display(), "backup created");

        if let Some(keep) = self.max_backups {
            if let Err(e) = self.cleanup_backups_for(stem, keep) {
                warn!(error = %e, "backup pruning failed");
            }
        }

        Ok(backup_path)
    }

    /// Open a fresh backup file, adding a counter when the name is taken
    fn create_unique(&self, stem: &str) -> Result<(PathBuf, File)> {
        let timestamp = Utc::now().format(BACKUP_DATE_FORMAT).to_string();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = if attempt == 0 {
                format!("{}-{}.{}", stem, timestamp, BACKUP_EXTENSION)
            } else {
                format!("{}-{}-{}.{}", stem, timestamp, attempt, BACKUP_EXTENSION)
            };
            let path = self.folder.join(filename);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(WalletError::general(
                        LayerOperation::Backup,
                        format!("Failed to create backup file: {}", e),
                    ));
                }
            }
        }
        Err(WalletError::general(
            LayerOperation::Backup,
            format!("no free backup name for {}-{}", stem, timestamp),
        ))
    }

    /// Replace `db_path` with the contents of a backup
    ///
    /// The database must not be open while restoring.
    pub fn restore_backup(&self, backup_path: &Path, db_path: &Path) -> Result<()> {
        if !backup_path.is_file() {
            return Err(WalletError::NotFound(backup_path.display().to_string()));
        }
        fs::copy(backup_path, db_path)?;
        info!(from = %backup_path.display(), to = %db_path.display(), "backup restored");
        Ok(())
    }

    /// List available backups, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();

        if !self.folder.exists() {
            return Ok(backups);
        }

        for entry in fs::read_dir(&self.folder)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(info) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|filename| parse_backup_filename(filename, &path))
            {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| (b.timestamp, b.sequence).cmp(&(a.timestamp, a.sequence)));

        Ok(backups)
    }

    /// Backups taken from wallet files named `stem`, newest first
    pub fn list_backups_for(&self, stem: &str) -> Result<Vec<BackupInfo>> {
        let mut backups = self.list_backups()?;
        backups.retain(|backup| backup.stem == stem);
        Ok(backups)
    }

    /// Clean up old backups, keeping `keep_count` for each wallet
    pub fn cleanup_old_backups(&self, keep_count: usize) -> Result<usize> {
        let mut stems: Vec<String> = self.list_backups()?.into_iter().map(|b| b.stem).collect();
        stems.sort();
        stems.dedup();

        let mut deleted = 0;
        for stem in &stems {
            deleted += self.cleanup_backups_for(stem, keep_count)?;
        }
        Ok(deleted)
    }

    /// Clean up old backups of one wallet, keeping only the newest `keep_count`
    pub fn cleanup_backups_for(&self, stem: &str, keep_count: usize) -> Result<usize> {
        let backups = self.list_backups_for(stem)?;

        let mut deleted = 0;
        for backup in backups.iter().skip(keep_count) {
            fs::remove_file(&backup.path)?;
            deleted += 1;
        }

        if deleted > 0 {
            info!(stem, deleted, kept = keep_count, "old backups removed");
        }
        Ok(deleted)
    }

    /// Get the latest backup
    pub fn get_latest_backup(&self) -> Result<Option<BackupInfo>> {
        Ok(self.list_backups()?.into_iter().next())
    }
}

/// Information about a backup file
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// Path to the backup file
    pub path: PathBuf,
    /// Stem of the wallet file the backup was taken from
    pub stem: String,
    /// Backup timestamp
    pub timestamp: DateTime<Utc>,
    /// Counter distinguishing backups taken within the same second
    pub sequence: u32,
    /// File size in bytes
    pub size: u64,
}

/// Name prefix of backups taken from `db_path`
fn backup_stem(db_path: &Path) -> &str {
    db_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("wallet")
}

/// Parse backup filename to extract information
fn parse_backup_filename(filename: &str, path: &Path) -> Option<BackupInfo> {
    // Format: <stem>-YYYYMMDD-HHMMSS[-n].bak; the stem may contain dashes
    let name = filename.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let parts: Vec<&str> = name.split('-').collect();

    let (date_index, sequence) = match parts.len() {
        n if n >= 4 && parse_timestamp(parts[n - 3], parts[n - 2]).is_some() => {
            (n - 3, parts[n - 1].parse().ok()?)
        }
        n if n >= 3 => (n - 2, 0),
        _ => return None,
    };
    let timestamp = parse_timestamp(parts[date_index], parts[date_index + 1])?;
    let stem = parts[..date_index].join("-");
    if stem.is_empty() {
        return None;
    }

    let size = path.metadata().ok()?.len();

    Some(BackupInfo {
        path: path.to_path_buf(),
        stem,
        timestamp,
        sequence,
        size,
    })
}

fn parse_timestamp(date_str: &str, time_str: &str) -> Option<DateTime<Utc>> {
    if date_str.len() != 8 || time_str.len() != 6 {
        return None;
    }
    let datetime_str = format!("{}-{}", date_str, time_str);
    let ndt = NaiveDateTime::parse_from_str(&datetime_str, BACKUP_DATE_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&ndt))
}
