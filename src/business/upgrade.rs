//! One-time encryption upgrade
//!
//! Moves a legacy (ECB) wallet to PBKDF2/CBC: every encrypted column of
//! every table is decrypted with the old cipher and re-encrypted with the
//! new one inside a single transaction, then the derivation parameters are
//! written to the metadata singleton.

use tracing::{info, warn};
use zeroize::Zeroizing;

use super::wallet::{Wallet, new_pbkdf2_parameters};
use crate::crypto::{Cipher, CipherProvider, CipherScheme};
use crate::database::{
    Card, CardAttachment, CardFieldValue, Category, Database, DatabaseMetadata, Record, Template,
    TemplateField, WalletInfo,
};
use crate::error::{Result, WalletError};

/// Moves ciphertext from one cipher to another
struct Recrypt<'a> {
    from: &'a Cipher,
    to: &'a Cipher,
}

impl Recrypt<'_> {
    /// Text columns go through the schemes' text encodings
    fn text(&self, data: &[u8]) -> Result<Vec<u8>> {
        let plain = Zeroizing::new(
            self.from
                .decrypt_text_checked(data)
                .ok_or_else(|| WalletError::DecryptionError("text column".to_string()))?,
        );
        let encrypted = self
            .to
            .encrypt(&plain)
            .ok_or_else(|| WalletError::EncryptionError("text column".to_string()))?;
        if self.to.decrypt_text(&encrypted).as_deref() != Some(plain.as_str()) {
            return Err(WalletError::EncryptionError("text column did not verify".to_string()));
        }
        Ok(encrypted)
    }

    fn optional_text(&self, data: &Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        data.as_deref().map(|data| self.text(data)).transpose()
    }

    fn bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let plain = Zeroizing::new(
            self.from
                .decrypt_bytes_checked(data)
                .ok_or_else(|| WalletError::DecryptionError("binary column".to_string()))?,
        );
        let encrypted = self
            .to
            .encrypt_bytes(&plain)
            .ok_or_else(|| WalletError::EncryptionError("binary column".to_string()))?;
        if self.to.decrypt_bytes(&encrypted).as_deref() != Some(plain.as_slice()) {
            return Err(WalletError::EncryptionError("binary column did not verify".to_string()));
        }
        Ok(encrypted)
    }
}

/// A record with encrypted columns
trait Encrypted: Record + Clone {
    fn recrypt(&self, recrypt: &Recrypt<'_>) -> Result<Self>;
}

impl Encrypted for WalletInfo {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            description: r.optional_text(&self.description)?,
            ..self.clone()
        })
    }
}

impl Encrypted for Category {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            description: r.optional_text(&self.description)?,
            ..self.clone()
        })
    }
}

impl Encrypted for Card {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            description: r.optional_text(&self.description)?,
            ..self.clone()
        })
    }
}

impl Encrypted for CardFieldValue {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            value: r.text(&self.value)?,
            ..self.clone()
        })
    }
}

impl Encrypted for CardAttachment {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            data: r.bytes(&self.data)?,
            ..self.clone()
        })
    }
}

impl Encrypted for Template {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            description: r.optional_text(&self.description)?,
            ..self.clone()
        })
    }
}

impl Encrypted for TemplateField {
    fn recrypt(&self, r: &Recrypt<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&self.name)?,
            ..self.clone()
        })
    }
}

/// Re-encrypt every row of `T`, returning the number of rows written
fn recrypt_table<T: Encrypted>(db: &mut Database, recrypt: &Recrypt<'_>) -> Result<usize> {
    let rows = db.select::<T>(None)?;
    for row in &rows {
        db.update(&row.recrypt(recrypt)?, Some(row))?;
    }
    Ok(rows.len())
}

impl Wallet {
    /// Upgrade a legacy wallet to PBKDF2 encryption
    ///
    /// `password` must be the wallet's current password; returns `false`
    /// without changing anything when it is not. On any failure the
    /// transaction is rolled back and the wallet keeps its legacy cipher.
    pub fn upgrade_encryption(&mut self, password: &str) -> Result<bool> {
        self.ensure_unlocked()?;
        if !self.cipher.scheme().is_legacy() {
            return Err(WalletError::EncryptionError(
                "wallet already uses the modern scheme".to_string(),
            ));
        }

        // Legacy encryption is deterministic, so equal keys give equal output
        let mut current = Cipher::new(CipherScheme::Legacy);
        if !current.unlock(password) || current.encrypt(password) != self.cipher.encrypt(password) {
            return Ok(false);
        }
        if let Some(info) = self.wallet_info()? {
            if current.decrypt_text_checked(&info.name).is_none() {
                warn!("wallet name does not decrypt under the session key, upgrade refused");
                return Ok(false);
            }
        }

        let (rounds, salt) = new_pbkdf2_parameters(&self.config, password);
        let mut modern = Cipher::new(CipherScheme::ModernPbkdf2 {
            rounds,
            salt: salt.clone(),
        });
        if !modern.unlock(password) {
            return Err(WalletError::KeyDerivation("password rejected".to_string()));
        }

        let recrypt = Recrypt {
            from: &self.cipher,
            to: &modern,
        };
        let rows = self.db.transaction(|db| {
            db.create_table::<DatabaseMetadata>()?;
            let rows = recrypt_table::<WalletInfo>(db, &recrypt)?
                + recrypt_table::<Category>(db, &recrypt)?
                + recrypt_table::<Card>(db, &recrypt)?
                + recrypt_table::<CardFieldValue>(db, &recrypt)?
                + recrypt_table::<CardAttachment>(db, &recrypt)?
                + recrypt_table::<Template>(db, &recrypt)?
                + recrypt_table::<TemplateField>(db, &recrypt)?;
            db.insert(&DatabaseMetadata::new(i64::from(rounds), salt))?;
            Ok(rows)
        })?;

        info!(rows, rounds, "wallet encryption upgraded");
        self.cipher = modern;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupManager;
    use crate::business::wallet::tests::{TEST_PASSWORD, create_test_wallet, test_config};
    use crate::database::RecordID;
    use tempfile::TempDir;

    /// A wallet file in the legacy layout: no metadata table, ECB ciphertext
    fn create_legacy_wallet(temp_dir: &TempDir) -> Wallet {
        let config = test_config(temp_dir);
        let mut db = Database::create(&config.database_path, BackupManager::from_config(&config)).unwrap();
        db.connection()
            .unwrap()
            .execute_batch("DROP TABLE \"spbwlt_DatabaseMetadata\"")
            .unwrap();

        let mut legacy = Cipher::new(CipherScheme::Legacy);
        assert!(legacy.unlock(TEST_PASSWORD));
        let info = WalletInfo::new(legacy.encrypt("Old Wallet").unwrap());
        let mut category = Category::new(legacy.encrypt("Bank").unwrap(), RecordID::root(), RecordID::root());
        category.description = Some(legacy.encrypt("accounts").unwrap());
        let card = Card::new(category.id.clone(), RecordID::generate(), legacy.encrypt("Visa").unwrap(), RecordID::root());
        let value = CardFieldValue::new(card.id.clone(), RecordID::generate(), legacy.encrypt("1234").unwrap());
        let attachment = CardAttachment::new(
            card.id.clone(),
            legacy.encrypt("scan.png").unwrap(),
            legacy.encrypt_bytes(&[0x89, 0x50, 0x4e, 0x47]).unwrap(),
        );
        for sql in [
            crate::database::queries::insert_sql(&info),
            crate::database::queries::insert_sql(&category),
            crate::database::queries::insert_sql(&card),
            crate::database::queries::insert_sql(&value),
            crate::database::queries::insert_sql(&attachment),
        ] {
            db.connection().unwrap().execute_batch(&sql).unwrap();
        }
        drop(db);

        let mut wallet = Wallet::open(&config).unwrap();
        assert!(wallet.scheme().is_legacy());
        assert!(wallet.unlock(TEST_PASSWORD).unwrap());
        wallet
    }

    #[test]
    fn test_upgrade_reencrypts_everything() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        assert!(wallet.metadata().unwrap().is_none());
        assert!(!wallet.database().table_exists(DatabaseMetadata::TABLE).unwrap());

        assert!(wallet.upgrade_encryption(TEST_PASSWORD).unwrap());
        assert!(matches!(wallet.scheme(), CipherScheme::ModernPbkdf2 { .. }));
        assert!(wallet.metadata().unwrap().is_some());

        let category = wallet.categories(&RecordID::root()).unwrap().remove(0);
        assert_eq!(wallet.decrypt_text(&category.name).unwrap(), "Bank");
        assert_eq!(wallet.decrypt_text(category.description.as_ref().unwrap()).unwrap(), "accounts");
        let card = wallet.cards(&category.id).unwrap().remove(0);
        assert_eq!(wallet.decrypt_text(&card.name).unwrap(), "Visa");
        let value = wallet.field_values(&card.id).unwrap().remove(0);
        assert_eq!(wallet.decrypt_text(&value.value).unwrap(), "1234");
        let attachment = wallet.attachments(&card.id).unwrap().remove(0);
        assert_eq!(wallet.decrypt_text(&attachment.name).unwrap(), "scan.png");
        assert_eq!(wallet.decrypt_bytes(&attachment.data).unwrap(), vec![0x89, 0x50, 0x4e, 0x47]);

        // A fresh session picks the new scheme from metadata
        let config = wallet.config().clone();
        drop(wallet);
        let mut reopened = Wallet::open(&config).unwrap();
        assert!(!reopened.scheme().is_legacy());
        assert!(reopened.unlock(TEST_PASSWORD).unwrap());
        let info = reopened.wallet_info().unwrap().unwrap();
        assert_eq!(reopened.decrypt_text(&info.name).unwrap(), "Old Wallet");
    }

    #[test]
    fn test_upgrade_takes_one_backup() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        let before = wallet.database().backups().list_backups().unwrap().len();
        assert!(wallet.upgrade_encryption(TEST_PASSWORD).unwrap());
        let after = wallet.database().backups().list_backups().unwrap().len();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_upgrade_wrong_password_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        assert!(!wallet.upgrade_encryption("not the password").unwrap());
        assert!(wallet.scheme().is_legacy());
        assert!(wallet.metadata().unwrap().is_none());
    }

    #[test]
    fn test_legacy_wrong_passwords_never_unlock_or_upgrade() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        wallet.lock();

        for attempt in 0..200 {
            let password = format!("guess-{attempt}");
            assert!(!wallet.unlock(&password).unwrap(), "{password} unlocked the wallet");
            assert!(!wallet.is_unlocked());
            assert!(matches!(wallet.upgrade_encryption(&password), Err(WalletError::Locked)));
        }
        assert!(wallet.scheme().is_legacy());
        assert!(wallet.metadata().unwrap().is_none());

        assert!(wallet.unlock(TEST_PASSWORD).unwrap());
        let info = wallet.wallet_info().unwrap().unwrap();
        assert_eq!(wallet.decrypt_text(&info.name).unwrap(), "Old Wallet");
    }

    #[test]
    fn test_upgrade_refuses_session_key_that_fails_the_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        // Bypass the unlock check to hold a key that cannot read the wallet
        assert!(wallet.cipher.unlock("guess-0"));

        assert!(!wallet.upgrade_encryption("guess-0").unwrap());
        assert!(wallet.scheme().is_legacy());
        assert!(wallet.metadata().unwrap().is_none());

        assert!(wallet.unlock(TEST_PASSWORD).unwrap());
        let category = wallet.categories(&RecordID::root()).unwrap().remove(0);
        assert_eq!(wallet.decrypt_text(&category.name).unwrap(), "Bank");
    }

    #[test]
    fn test_upgrade_rolls_back_on_undecryptable_row() {
        let temp_dir = TempDir::new().unwrap();
        let mut wallet = create_legacy_wallet(&temp_dir);
        let garbage = Category::new(vec![1, 2, 3], RecordID::root(), RecordID::root());
        wallet.database().insert(&garbage).unwrap();

        let result = wallet.upgrade_encryption(TEST_PASSWORD);
        assert!(matches!(result, Err(WalletError::DecryptionError(_))));
        assert!(wallet.scheme().is_legacy());
        assert!(!wallet.database().in_transaction());
        assert!(wallet.metadata().unwrap().is_none());

        let info = wallet.wallet_info().unwrap().unwrap();
        assert_eq!(wallet.decrypt_text(&info.name).unwrap(), "Old Wallet");
    }

    #[test]
    fn test_upgrade_requires_legacy_and_unlocked() {
        let (mut wallet, _temp) = create_test_wallet();
        assert!(matches!(
            wallet.upgrade_encryption(TEST_PASSWORD),
            Err(WalletError::EncryptionError(_))
        ));
        wallet.lock();
        assert!(matches!(wallet.upgrade_encryption(TEST_PASSWORD), Err(WalletError::Locked)));
    }
}
