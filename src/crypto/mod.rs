//! Cryptographic operations for SWL wallets
//!
//! Every encrypted name, description, field value and attachment goes
//! through a [`CipherProvider`]. Two schemes exist:
//!
//! - legacy AES-256-ECB with a SHA-1 derived key ([`LegacyCipher`])
//! - AES-256-CBC with a SHA-256 or PBKDF2 derived key ([`ModernCipher`])
//!
//! Neither scheme authenticates its ciphertext, so a wrong password and
//! corrupted data look the same: an absent result, or garbage text.

pub mod kdf;
mod key;
mod legacy;
mod modern;

pub use kdf::{PrfHash, calibrate, derive};
pub use key::{KEY_LENGTH, SecretKey, from_utf16le, utf16le};
pub use legacy::LegacyCipher;
pub use modern::{IV_SIZE, KeySource, ModernCipher};

use crate::database::models::DatabaseMetadata;

/// Capability shared by every cipher
///
/// All operations fail closed: before a successful `unlock`, or after
/// `lock`, they return `None`.
pub trait CipherProvider {
    /// Derive and hold the key for `password`
    fn unlock(&mut self, password: &str) -> bool;

    /// Discard the key
    fn lock(&mut self);

    fn is_unlocked(&self) -> bool;

    fn decrypt_bytes(&self, data: &[u8]) -> Option<Vec<u8>>;

    fn decrypt_text(&self, data: &[u8]) -> Option<String>;

    fn encrypt_bytes(&self, plain: &[u8]) -> Option<Vec<u8>>;

    fn encrypt(&self, text: &str) -> Option<Vec<u8>>;
}

/// Which cipher a wallet uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherScheme {
    Legacy,
    ModernSha256,
    ModernPbkdf2 { rounds: u32, salt: Vec<u8> },
}

impl CipherScheme {
    /// Scheme implied by the metadata singleton
    ///
    /// No metadata means legacy. Metadata without a positive round count
    /// selects the direct SHA-256 key.
    pub fn from_metadata(metadata: Option<&DatabaseMetadata>) -> Self {
        let Some(meta) = metadata else {
            return CipherScheme::Legacy;
        };
        match u32::try_from(meta.pbkdf2_rounds) {
            Ok(rounds) if rounds > 0 => CipherScheme::ModernPbkdf2 {
                rounds,
                salt: meta.pbkdf2_salt.clone(),
            },
            _ => CipherScheme::ModernSha256,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, CipherScheme::Legacy)
    }
}

/// A cipher of one of the known schemes
#[derive(Debug)]
pub enum Cipher {
    Legacy(LegacyCipher),
    Modern(ModernCipher),
}

impl Cipher {
    /// Create a locked cipher for `scheme`
    pub fn new(scheme: CipherScheme) -> Self {
        match scheme {
            CipherScheme::Legacy => Cipher::Legacy(LegacyCipher::new()),
            CipherScheme::ModernSha256 => Cipher::Modern(ModernCipher::new(KeySource::Sha256)),
            CipherScheme::ModernPbkdf2 { rounds, salt } => {
                Cipher::Modern(ModernCipher::new(KeySource::Pbkdf2 { rounds, salt }))
            }
        }
    }

    /// Scheme of this cipher
    pub fn scheme(&self) -> CipherScheme {
        match self {
            Cipher::Legacy(_) => CipherScheme::Legacy,
            Cipher::Modern(modern) => match modern.source() {
                KeySource::Sha256 => CipherScheme::ModernSha256,
                KeySource::Pbkdf2 { rounds, salt } => CipherScheme::ModernPbkdf2 {
                    rounds: *rounds,
                    salt: salt.clone(),
                },
            },
        }
    }

    /// Decryption that rejects data not produced under the current key
    ///
    /// Modern padding is already verified; legacy data must carry the
    /// exact fill it was written with.
    pub fn decrypt_bytes_checked(&self, data: &[u8]) -> Option<Vec<u8>> {
        match self {
            Cipher::Legacy(legacy) => legacy.decrypt_bytes_checked(data),
            Cipher::Modern(modern) => modern.decrypt_bytes(data),
        }
    }

    pub fn decrypt_text_checked(&self, data: &[u8]) -> Option<String> {
        match self {
            Cipher::Legacy(legacy) => legacy.decrypt_text_checked(data),
            Cipher::Modern(modern) => modern.decrypt_text(data),
        }
    }

    fn provider(&self) -> &dyn CipherProvider {
        match self {
            Cipher::Legacy(legacy) => legacy,
            Cipher::Modern(modern) => modern,
        }
    }

    fn provider_mut(&mut self) -> &mut dyn CipherProvider {
        match self {
            Cipher::Legacy(legacy) => legacy,
            Cipher::Modern(modern) => modern,
        }
    }
}

impl CipherProvider for Cipher {
    fn unlock(&mut self, password: &str) -> bool {
        self.provider_mut().unlock(password)
    }

    fn lock(&mut self) {
        self.provider_mut().lock();
    }

    fn is_unlocked(&self) -> bool {
        self.provider().is_unlocked()
    }

    fn decrypt_bytes(&self, data: &[u8]) -> Option<Vec<u8>> {
        self.provider().decrypt_bytes(data)
    }

    fn decrypt_text(&self, data: &[u8]) -> Option<String> {
        self.provider().decrypt_text(data)
    }

    fn encrypt_bytes(&self, plain: &[u8]) -> Option<Vec<u8>> {
        self.provider().encrypt_bytes(plain)
    }

    fn encrypt(&self, text: &str) -> Option<Vec<u8>> {
        self.provider().encrypt(text)
    }
}
