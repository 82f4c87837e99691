//! Key material for the AES-256 ciphers
//!
//! Three ways to turn a password into a 32-byte key:
//! 1. Legacy: SHA-1 of the UTF-16LE password plus its null terminator;
//!    the 20-byte digest is followed by its own first 12 bytes
//! 2. SHA-256 of the UTF-16LE password
//! 3. PBKDF2-HMAC-SHA512 of the UTF-8 password with a stored salt and round count

use std::fmt;

use sha1::{Digest, Sha1};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::kdf::{self, PrfHash};
use crate::error::{Result, WalletError};

/// Key length for AES-256 (32 bytes = 256 bits)
pub const KEY_LENGTH: usize = 32;

/// SHA-1 digest length
const SHA1_LENGTH: usize = 20;

/// A 256-bit key, zeroized on drop
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SecretKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Copy key bytes from a slice of exactly `KEY_LENGTH` bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let mut key = [0u8; KEY_LENGTH];
        if bytes.len() != KEY_LENGTH {
            return None;
        }
        key.copy_from_slice(bytes);
        let secret = Self::new(key);
        zeroize::Zeroize::zeroize(&mut key);
        Some(secret)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Encode text as UTF-16 little-endian bytes
pub fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Decode UTF-16 little-endian bytes, rejecting odd lengths and lone surrogates
pub fn from_utf16le(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Derive the legacy ECB key
pub fn legacy_key(password: &str) -> SecretKey {
    let mut input = Zeroizing::new(utf16le(password));
    input.extend_from_slice(&[0, 0]);

    let digest = Sha1::digest(input.as_slice());
    let mut key = [0u8; KEY_LENGTH];
    key[..SHA1_LENGTH].copy_from_slice(&digest);
    key[SHA1_LENGTH..].copy_from_slice(&digest[..KEY_LENGTH - SHA1_LENGTH]);

    let secret = SecretKey::new(key);
    zeroize::Zeroize::zeroize(&mut key);
    secret
}

/// Derive the modern key directly from SHA-256
pub fn sha256_key(password: &str) -> SecretKey {
    let input = Zeroizing::new(utf16le(password));
    let digest = Sha256::digest(input.as_slice());
    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&digest);
    let secret = SecretKey::new(key);
    zeroize::Zeroize::zeroize(&mut key);
    secret
}

/// Derive the modern key with PBKDF2-HMAC-SHA512
pub fn pbkdf2_key(password: &str, salt: &[u8], rounds: u32) -> Result<SecretKey> {
    let derived = kdf::derive(password.as_bytes(), salt, rounds, PrfHash::Sha512)?;
    SecretKey::from_slice(&derived)
        .ok_or_else(|| WalletError::KeyDerivation("unexpected derived key length".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16le_encoding() {
        assert_eq!(utf16le("ab"), vec![0x61, 0x00, 0x62, 0x00]);
        assert_eq!(utf16le(""), Vec::<u8>::new());
        // Non-BMP character becomes a surrogate pair
        assert_eq!(utf16le("😀").len(), 4);
    }

    #[test]
    fn test_from_utf16le() {
        assert_eq!(from_utf16le(&[0x61, 0x00, 0x62, 0x00]).as_deref(), Some("ab"));
        assert_eq!(from_utf16le(&utf16le("Привет")).as_deref(), Some("Привет"));
        assert!(from_utf16le(&[0x61]).is_none());
        // Lone high surrogate
        assert!(from_utf16le(&[0x00, 0xd8]).is_none());
    }

    #[test]
    fn test_legacy_key_vector() {
        let key = legacy_key("abc123");
        assert_eq!(
            hex::encode(key.as_bytes()),
            "206efdaf0b767563dac0d08798e53493efdbb8b0206efdaf0b767563dac0d087"
        );
    }

    #[test]
    fn test_legacy_key_repeats_digest_prefix() {
        let key = legacy_key("anything");
        let bytes = key.as_bytes();
        assert_eq!(&bytes[SHA1_LENGTH..], &bytes[..KEY_LENGTH - SHA1_LENGTH]);
    }

    #[test]
    fn test_sha256_key_vector() {
        let key = sha256_key("correcthorsebatterystaple");
        assert_eq!(
            hex::encode(key.as_bytes()),
            "122614c3ee529a42eaffbf5c95a0c701f2140e9f3c0093fdb44ea5e19f5064a6"
        );
    }

    #[test]
    fn test_pbkdf2_key_vector() {
        let salt = hex::decode("8c1f3b0e5d72a9466ef0c2d81b4a9357").unwrap();
        let key = pbkdf2_key("correcthorsebatterystaple", &salt, 10_000).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "b115da925fa7940f5a0436edf4b0a756e6d14d218ad3535f85faff66fa119f22"
        );
    }

    #[test]
    fn test_secret_key_debug_redacted() {
        let key = legacy_key("abc123");
        assert_eq!(format!("{:?}", key), "SecretKey([REDACTED])");
    }

    #[test]
    fn test_secret_key_from_slice_length() {
        assert!(SecretKey::from_slice(&[1u8; 16]).is_none());
        assert!(SecretKey::from_slice(&[1u8; 32]).is_some());
    }
}
