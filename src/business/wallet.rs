//! Main Wallet API
//!
//! This module provides the primary interface for interacting with
//! an SWL wallet file.

use std::io;
use std::path::Path;

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::config::WalletConfig;
use crate::crypto::{Cipher, CipherProvider, CipherScheme, PrfHash, kdf};
use crate::database::schema::DEFAULT_FIELD_TYPES;
use crate::database::{
    Card, CardAttachment, CardFieldValue, Category, Database, DatabaseMetadata, DatabaseVersion, Icon,
    Record, RecordID, Template, TemplateField, TemplateFieldType, WalletInfo,
};
use crate::error::{Result, WalletError};
use crate::DATABASE_VERSION;

/// Main wallet interface
pub struct Wallet {
    pub(crate) config: WalletConfig,
    /// Database session
    pub(crate) db: Database,
    /// Cipher selected from the database metadata
    pub(crate) cipher: Cipher,
}

impl Wallet {
    /// Open an existing wallet
    ///
    /// The cipher scheme is read from the metadata singleton; a wallet
    /// without one uses the legacy scheme. The wallet starts locked.
    pub fn open(config: &WalletConfig) -> Result<Self> {
        config.validate()?;
        if !config.database_path.is_file() {
            return Err(WalletError::NotFound(config.database_path.display().to_string()));
        }

        let mut db = Database::open(&config.database_path, BackupManager::from_config(config));
        let metadata = read_metadata(&mut db)?;
        let scheme = CipherScheme::from_metadata(metadata.as_ref());
        debug!(path = %config.database_path.display(), legacy = scheme.is_legacy(), "wallet opened");

        Ok(Self {
            config: config.clone(),
            db,
            cipher: Cipher::new(scheme),
        })
    }

    /// Create a new wallet protected by `password`
    ///
    /// New wallets use PBKDF2 with a round count calibrated to
    /// `config.calibration_ms` on this machine. The file must lie inside
    /// the storage area; if any step fails after it was created, it is
    /// removed again.
    pub fn create(config: &WalletConfig, password: &str, name: &str) -> Result<Self> {
        config.validate()?;
        if config.database_path.exists() {
            return Err(WalletError::IoError(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", config.database_path.display()),
            )));
        }
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.storage_root)?;
        let backups = BackupManager::from_config(config);
        backups.check_managed(&config.database_path)?;

        let (rounds, salt) = new_pbkdf2_parameters(config, password);
        let mut cipher = Cipher::new(CipherScheme::ModernPbkdf2 {
            rounds,
            salt: salt.clone(),
        });
        if !cipher.unlock(password) {
            return Err(WalletError::KeyDerivation("password rejected".to_string()));
        }

        let metadata = DatabaseMetadata::new(i64::from(rounds), salt);
        let db = match populate(config, backups, &cipher, name, metadata) {
            Ok(db) => db,
            Err(e) => {
                discard_partial(&config.database_path);
                return Err(e);
            }
        };
        info!(path = %config.database_path.display(), rounds, "wallet created");

        Ok(Self {
            config: config.clone(),
            db,
            cipher,
        })
    }

    /// Unlock the wallet with a password
    ///
    /// The password is checked by decrypting the wallet name, including
    /// its padding. Returns `false` and stays locked when it does not
    /// decrypt.
    pub fn unlock(&mut self, password: &str) -> Result<bool> {
        if !self.cipher.unlock(password) {
            return Ok(false);
        }

        if let Some(info) = self.wallet_info()? {
            if self.cipher.decrypt_text_checked(&info.name).is_none() {
                self.cipher.lock();
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Lock the wallet
    pub fn lock(&mut self) {
        self.cipher.lock();
    }

    /// Check if the wallet is unlocked
    pub fn is_unlocked(&self) -> bool {
        self.cipher.is_unlocked()
    }

    /// Active cipher scheme
    pub fn scheme(&self) -> CipherScheme {
        self.cipher.scheme()
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Get a mutable reference to the database session
    pub fn database(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Close the wallet
    pub fn close(&mut self) {
        self.lock();
        self.db.close();
    }

    /// Ensure wallet is unlocked
    pub(crate) fn ensure_unlocked(&self) -> Result<()> {
        if !self.cipher.is_unlocked() {
            return Err(WalletError::Locked);
        }
        Ok(())
    }

    // ========================================================================
    // Reads (ciphertext is returned as stored)
    // ========================================================================

    pub fn wallet_info(&mut self) -> Result<Option<WalletInfo>> {
        Ok(self.db.select::<WalletInfo>(None)?.into_iter().next())
    }

    /// Direct children of `parent`; the root id lists top-level categories
    pub fn categories(&mut self, parent: &RecordID) -> Result<Vec<Category>> {
        self.db.select_by_id(column_of::<Category>("parentCategoryID"), parent)
    }

    pub fn cards(&mut self, category: &RecordID) -> Result<Vec<Card>> {
        self.db.select_by_id(column_of::<Card>("categoryID"), category)
    }

    pub fn field_values(&mut self, card: &RecordID) -> Result<Vec<CardFieldValue>> {
        self.db.select_by_id(column_of::<CardFieldValue>("cardID"), card)
    }

    pub fn attachments(&mut self, card: &RecordID) -> Result<Vec<CardAttachment>> {
        self.db.select_by_id(column_of::<CardAttachment>("cardID"), card)
    }

    pub fn templates(&mut self) -> Result<Vec<Template>> {
        self.db.select(None)
    }

    pub fn template_fields(&mut self, template: &RecordID) -> Result<Vec<TemplateField>> {
        let mut fields: Vec<TemplateField> = self
            .db
            .select_by_id(column_of::<TemplateField>("templateID"), template)?;
        fields.sort_by_key(|field| field.priority);
        Ok(fields)
    }

    pub fn field_types(&mut self) -> Result<Vec<TemplateFieldType>> {
        let mut types: Vec<TemplateFieldType> = self.db.select(None)?;
        types.sort_by_key(|t| t.priority);
        Ok(types)
    }

    pub fn icons(&mut self) -> Result<Vec<Icon>> {
        self.db.select(None)
    }

    pub fn database_version(&mut self) -> Result<Option<i64>> {
        Ok(self
            .db
            .select::<DatabaseVersion>(None)?
            .into_iter()
            .map(|v| v.version)
            .max())
    }

    /// Key derivation parameters; `None` for legacy wallets
    pub fn metadata(&mut self) -> Result<Option<DatabaseMetadata>> {
        read_metadata(&mut self.db)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a category under `parent`
    pub fn add_category(&mut self, name: &str, parent: &RecordID) -> Result<Category> {
        self.ensure_unlocked()?;
        let category = Category::new(self.encrypt_text(name)?, parent.clone(), RecordID::root());
        self.db.insert(&category)?;
        Ok(category)
    }

    pub fn rename_category(&mut self, id: &RecordID, name: &str) -> Result<()> {
        self.ensure_unlocked()?;
        let previous = self
            .db
            .find::<Category>(id)?
            .ok_or_else(|| WalletError::NotFound(format!("category {}", id)))?;
        let mut renamed = previous.clone();
        renamed.name = self.encrypt_text(name)?;
        self.db.update(&renamed, Some(&previous))?;
        Ok(())
    }

    /// Create a card of `template` in `category`
    pub fn add_card(&mut self, category: &RecordID, template: &RecordID, name: &str) -> Result<Card> {
        self.ensure_unlocked()?;
        if self.db.find::<Category>(category)?.is_none() {
            return Err(WalletError::NotFound(format!("category {}", category)));
        }
        let card = Card::new(category.clone(), template.clone(), self.encrypt_text(name)?, RecordID::root());
        self.db.insert(&card)?;
        Ok(card)
    }

    /// Set the value of one template field on a card, replacing any
    /// existing value
    pub fn set_field_value(
        &mut self,
        card: &RecordID,
        template_field: &RecordID,
        value: &str,
    ) -> Result<CardFieldValue> {
        self.ensure_unlocked()?;
        let encrypted = self.encrypt_text(value)?;

        let existing = self
            .field_values(card)?
            .into_iter()
            .find(|v| &v.template_field_id == template_field);

        match existing {
            Some(previous) => {
                let mut updated = previous.clone();
                updated.value = encrypted;
                self.db.update(&updated, Some(&previous))?;
                Ok(updated)
            }
            None => {
                if self.db.find::<Card>(card)?.is_none() {
                    return Err(WalletError::NotFound(format!("card {}", card)));
                }
                let created = CardFieldValue::new(card.clone(), template_field.clone(), encrypted);
                self.db.insert(&created)?;
                Ok(created)
            }
        }
    }

    /// Attach a file to a card
    pub fn add_attachment(&mut self, card: &RecordID, name: &str, data: &[u8]) -> Result<CardAttachment> {
        self.ensure_unlocked()?;
        if self.db.find::<Card>(card)?.is_none() {
            return Err(WalletError::NotFound(format!("card {}", card)));
        }
        let encrypted = self
            .cipher
            .encrypt_bytes(data)
            .ok_or_else(|| WalletError::EncryptionError("attachment data".to_string()))?;
        let attachment = CardAttachment::new(card.clone(), self.encrypt_text(name)?, encrypted);
        self.db.insert(&attachment)?;
        Ok(attachment)
    }

    // ========================================================================
    // Cipher pass-throughs
    // ========================================================================

    pub fn decrypt_text(&self, data: &[u8]) -> Result<String> {
        self.ensure_unlocked()?;
        self.cipher
            .decrypt_text(data)
            .ok_or_else(|| WalletError::DecryptionError("wrong key or corrupted data".to_string()))
    }

    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.ensure_unlocked()?;
        self.cipher
            .decrypt_bytes(data)
            .ok_or_else(|| WalletError::DecryptionError("wrong key or corrupted data".to_string()))
    }

    pub fn encrypt_text(&self, text: &str) -> Result<Vec<u8>> {
        self.ensure_unlocked()?;
        encrypt_with(&self.cipher, text)
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        self.close();
    }
}

/// Create the database file and write the rows every wallet starts with
fn populate(
    config: &WalletConfig,
    backups: BackupManager,
    cipher: &Cipher,
    name: &str,
    metadata: DatabaseMetadata,
) -> Result<Database> {
    let mut db = Database::create(&config.database_path, backups)?;
    let info = WalletInfo::new(encrypt_with(cipher, name)?);
    db.transaction(|db| {
        db.insert(&DatabaseVersion {
            version: DATABASE_VERSION,
        })?;
        db.insert(&metadata)?;
        db.insert(&info)?;
        for &(id, name, priority) in DEFAULT_FIELD_TYPES {
            db.insert(&TemplateFieldType {
                id,
                name: name.to_string(),
                priority,
            })?;
        }
        Ok(())
    })?;
    Ok(db)
}

/// Remove a wallet file whose creation failed part way
fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), "removed partially created wallet"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partially created wallet"),
    }
}

/// Metadata singleton, tolerating files without the table
pub(crate) fn read_metadata(db: &mut Database) -> Result<Option<DatabaseMetadata>> {
    if !db.table_exists(DatabaseMetadata::TABLE)? {
        return Ok(None);
    }
    Ok(db.select::<DatabaseMetadata>(None)?.into_iter().next())
}

pub(crate) fn encrypt_with(cipher: &Cipher, text: &str) -> Result<Vec<u8>> {
    cipher
        .encrypt(text)
        .ok_or_else(|| WalletError::EncryptionError("cipher is locked".to_string()))
}

/// Calibrated rounds and a fresh random salt
pub(crate) fn new_pbkdf2_parameters(config: &WalletConfig, password: &str) -> (u32, Vec<u8>) {
    let rounds = kdf::calibrate(password.len(), config.salt_len, config.calibration_ms, PrfHash::Sha512);
    let mut salt = vec![0u8; config.salt_len];
    rand::rng().fill_bytes(&mut salt);
    (rounds, salt)
}

/// Declared column name, checked against the record's schema in debug builds
fn column_of<T: Record>(name: &'static str) -> &'static str {
    debug_assert!(T::column_index(name).is_some(), "{} has no column {}", T::TABLE, name);
    name
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub const TEST_PASSWORD: &str = "TestPassword123";

    pub fn test_config(temp_dir: &TempDir) -> WalletConfig {
        WalletConfig {
            calibration_ms: 0,
            ..WalletConfig::new(temp_dir.path(), "test")
        }
    }

    pub fn create_test_wallet() -> (Wallet, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let wallet = Wallet::create(&test_config(&temp_dir), TEST_PASSWORD, "My Wallet").unwrap();
        (wallet, temp_dir)
    }

    #[test]
    fn test_create_and_unlock() {
        let (mut wallet, _temp) = create_test_wallet();
        assert!(wallet.is_unlocked());
        wallet.lock();
        assert!(!wallet.is_unlocked());
        assert!(wallet.unlock(TEST_PASSWORD).unwrap());
        assert!(wallet.is_unlocked());
    }

    #[test]
    fn test_create_outside_storage_area_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let config = WalletConfig {
            database_path: elsewhere.path().join("stray.swl"),
            ..test_config(&temp_dir)
        };

        let err = Wallet::create(&config, TEST_PASSWORD, "Stray").err().unwrap();
        assert_eq!(
            err.layer(),
            Some((crate::error::LayerOperation::Backup, crate::error::LayerErrorKind::Requirements))
        );
        assert!(!config.database_path.exists());

        // The same name inside the storage area is still free
        let config = WalletConfig {
            database_path: temp_dir.path().join("stray.swl"),
            ..config
        };
        let mut wallet = Wallet::create(&config, TEST_PASSWORD, "Stray").unwrap();
        wallet.lock();
        assert!(!wallet.unlock("anything").unwrap());
        assert!(wallet.unlock(TEST_PASSWORD).unwrap());
    }

    #[test]
    fn test_failed_create_removes_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        // A regular file where the backup folder should be
        std::fs::write(temp_dir.path().join(&config.backup_dir), b"").unwrap();

        let err = Wallet::create(&config, TEST_PASSWORD, "My Wallet").err().unwrap();
        assert_eq!(
            err.layer(),
            Some((crate::error::LayerOperation::Backup, crate::error::LayerErrorKind::General))
        );
        assert!(!config.database_path.exists());
        assert!(matches!(Wallet::open(&config), Err(WalletError::NotFound(_))));

        std::fs::remove_file(temp_dir.path().join(&config.backup_dir)).unwrap();
        Wallet::create(&config, TEST_PASSWORD, "My Wallet").unwrap();
    }

    #[test]
    fn test_wrong_password() {
        let (mut wallet, _temp) = create_test_wallet();
        wallet.lock();
        assert!(!wallet.unlock("WrongPassword").unwrap());
        assert!(!wallet.is_unlocked());
        assert!(!wallet.unlock("").unwrap());
    }

    #[test]
    fn test_new_wallet_contents() {
        let (mut wallet, _temp) = create_test_wallet();
        assert_eq!(wallet.database_version().unwrap(), Some(DATABASE_VERSION));

        let meta = wallet.metadata().unwrap().unwrap();
        assert!(meta.pbkdf2_rounds >= i64::from(kdf::MIN_CALIBRATED_ROUNDS));
        assert_eq!(meta.pbkdf2_salt.len(), 16);
        assert!(matches!(wallet.scheme(), CipherScheme::ModernPbkdf2 { .. }));

        let info = wallet.wallet_info().unwrap().unwrap();
        assert_eq!(wallet.decrypt_text(&info.name).unwrap(), "My Wallet");

        let types = wallet.field_types().unwrap();
        assert_eq!(types.len(), DEFAULT_FIELD_TYPES.len());
        assert_eq!(types[0].name, "text");
    }

    #[test]
    fn test_reopen_uses_stored_scheme() {
        let (wallet, temp) = create_test_wallet();
        let scheme = wallet.scheme();
        drop(wallet);

        let mut reopened = Wallet::open(&test_config(&temp)).unwrap();
        assert_eq!(reopened.scheme(), scheme);
        assert!(!reopened.is_unlocked());
        assert!(reopened.unlock(TEST_PASSWORD).unwrap());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let (_wallet, temp) = create_test_wallet();
        assert!(matches!(
            Wallet::create(&test_config(&temp), TEST_PASSWORD, "Again"),
            Err(WalletError::IoError(_))
        ));
    }

    #[test]
    fn test_open_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let result = Wallet::open(&test_config(&temp_dir));
        assert!(matches!(result, Err(WalletError::NotFound(_))));
    }

    #[test]
    fn test_category_tree() {
        let (mut wallet, _temp) = create_test_wallet();
        let work = wallet.add_category("Work", &RecordID::root()).unwrap();
        let home = wallet.add_category("Home", &RecordID::root()).unwrap();
        let servers = wallet.add_category("Servers", &work.id).unwrap();

        let top = wallet.categories(&RecordID::root()).unwrap();
        assert_eq!(top.len(), 2);
        let mut names: Vec<String> = top.iter().map(|c| wallet.decrypt_text(&c.name).unwrap()).collect();
        names.sort();
        assert_eq!(names, vec!["Home", "Work"]);

        assert_eq!(wallet.categories(&work.id).unwrap(), vec![servers]);
        assert!(wallet.categories(&home.id).unwrap().is_empty());
    }

    #[test]
    fn test_rename_category() {
        let (mut wallet, _temp) = create_test_wallet();
        let category = wallet.add_category("Old", &RecordID::root()).unwrap();
        wallet.rename_category(&category.id, "New").unwrap();

        let stored = wallet.categories(&RecordID::root()).unwrap();
        assert_eq!(wallet.decrypt_text(&stored[0].name).unwrap(), "New");

        let missing = wallet.rename_category(&RecordID::generate(), "x");
        assert!(matches!(missing, Err(WalletError::NotFound(_))));
    }

    #[test]
    fn test_cards_fields_and_attachments() {
        let (mut wallet, _temp) = create_test_wallet();
        let category = wallet.add_category("Email", &RecordID::root()).unwrap();
        let template = RecordID::generate();
        let login = RecordID::generate();
        let card = wallet.add_card(&category.id, &template, "Mailbox").unwrap();

        let first = wallet.set_field_value(&card.id, &login, "alice").unwrap();
        let second = wallet.set_field_value(&card.id, &login, "bob").unwrap();
        assert_eq!(first.id, second.id);

        let values = wallet.field_values(&card.id).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(wallet.decrypt_text(&values[0].value).unwrap(), "bob");

        let data = vec![0u8, 1, 2, 255];
        wallet.add_attachment(&card.id, "key.bin", &data).unwrap();
        let attachments = wallet.attachments(&card.id).unwrap();
        assert_eq!(wallet.decrypt_bytes(&attachments[0].data).unwrap(), data);
        assert_eq!(wallet.decrypt_text(&attachments[0].name).unwrap(), "key.bin");

        assert_eq!(wallet.cards(&category.id).unwrap(), vec![card]);
    }

    #[test]
    fn test_writes_reference_existing_parents() {
        let (mut wallet, _temp) = create_test_wallet();
        let nowhere = RecordID::generate();
        assert!(matches!(
            wallet.add_card(&nowhere, &RecordID::generate(), "x"),
            Err(WalletError::NotFound(_))
        ));
        assert!(matches!(
            wallet.set_field_value(&nowhere, &RecordID::generate(), "x"),
            Err(WalletError::NotFound(_))
        ));
        assert!(matches!(
            wallet.add_attachment(&nowhere, "a", b"b"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn test_locked_wallet_refuses_crypto_and_writes() {
        let (mut wallet, _temp) = create_test_wallet();
        let info = wallet.wallet_info().unwrap().unwrap();
        wallet.lock();

        assert!(matches!(wallet.decrypt_text(&info.name), Err(WalletError::Locked)));
        assert!(matches!(wallet.encrypt_text("x"), Err(WalletError::Locked)));
        assert!(matches!(
            wallet.add_category("x", &RecordID::root()),
            Err(WalletError::Locked)
        ));
        // Ciphertext reads still work
        assert!(wallet.categories(&RecordID::root()).unwrap().is_empty());
    }

    #[test]
    fn test_decrypt_garbage() {
        let (wallet, _temp) = create_test_wallet();
        assert!(matches!(
            wallet.decrypt_text(&[1, 2, 3]),
            Err(WalletError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_writes_are_backed_up() {
        let (mut wallet, _temp) = create_test_wallet();
        let before = wallet.database().backups().list_backups().unwrap().len();
        wallet.add_category("Backed up", &RecordID::root()).unwrap();
        let after = wallet.database().backups().list_backups().unwrap().len();
        assert_eq!(after, before + 1);
    }
}
