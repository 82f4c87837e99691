//! AES-256-CBC cipher with PKCS7 padding
//!
//! Data layout: a fresh random 16-byte IV followed by the CBC ciphertext.
//! The key comes either straight from SHA-256 of the password or from
//! PBKDF2 with the salt and round count stored in the database metadata.
//! Text is encoded as UTF-8.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use super::CipherProvider;
use super::key::{SecretKey, pbkdf2_key, sha256_key};

/// IV size for AES-CBC (16 bytes = 128 bits)
pub const IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Where the modern key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// SHA-256 of the UTF-16LE password
    Sha256,
    /// PBKDF2-HMAC-SHA512 with stored parameters
    Pbkdf2 { rounds: u32, salt: Vec<u8> },
}

/// Modern cipher context
#[derive(Debug)]
pub struct ModernCipher {
    source: KeySource,
    key: Option<SecretKey>,
}

impl ModernCipher {
    /// Create a locked cipher that will derive its key from `source`
    pub fn new(source: KeySource) -> Self {
        Self { source, key: None }
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }
}

impl CipherProvider for ModernCipher {
    fn unlock(&mut self, password: &str) -> bool {
        self.key = None;
        if password.is_empty() {
            return false;
        }
        let derived = match &self.source {
            KeySource::Sha256 => Some(sha256_key(password)),
            KeySource::Pbkdf2 { rounds, salt } => pbkdf2_key(password, salt, *rounds).ok(),
        };
        self.key = derived;
        self.key.is_some()
    }

    fn lock(&mut self) {
        self.key = None;
    }

    fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    fn decrypt_bytes(&self, data: &[u8]) -> Option<Vec<u8>> {
        let key = self.key.as_ref()?;
        if data.len() <= IV_SIZE {
            return None;
        }

        let (iv, body) = data.split_at(IV_SIZE);
        let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), iv).ok()?;
        decryptor.decrypt_padded_vec_mut::<Pkcs7>(body).ok()
    }

    fn decrypt_text(&self, data: &[u8]) -> Option<String> {
        let plain = self.decrypt_bytes(data)?;
        String::from_utf8(plain).ok()
    }

    fn encrypt_bytes(&self, plain: &[u8]) -> Option<Vec<u8>> {
        let key = self.key.as_ref()?;
        let iv: [u8; IV_SIZE] = rand::random();

        let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv).ok()?;
        let body = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plain);

        let mut output = Vec::with_capacity(IV_SIZE + body.len());
        output.extend_from_slice(&iv);
        output.extend_from_slice(&body);
        Some(output)
    }

    fn encrypt(&self, text: &str) -> Option<Vec<u8>> {
        let plain = Zeroizing::new(text.as_bytes().to_vec());
        self.encrypt_bytes(&plain)
    }
}
