//! Legacy AES-256-ECB cipher
//!
//! Data layout: a 4-byte header whose first byte is the pad length
//! (bytes 1-3 are zero) followed by raw ECB blocks. No IV, no MAC.
//! Text is encoded as UTF-16LE before encryption.
//!
//! ECB leaks equal plaintext blocks; the scheme is kept only so existing
//! wallets stay readable until they are upgraded.

use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use zeroize::{Zeroize, Zeroizing};

use super::CipherProvider;
use super::key::{SecretKey, from_utf16le, legacy_key, utf16le};

/// AES block size
const BLOCK_SIZE: usize = 16;

/// Header size in front of the ECB blocks
pub const HEADER_SIZE: usize = 4;

/// Legacy cipher context
#[derive(Debug, Default)]
pub struct LegacyCipher {
    key: Option<SecretKey>,
}

impl LegacyCipher {
    /// Create a locked cipher
    pub fn new() -> Self {
        Self { key: None }
    }

    fn block_cipher(&self) -> Option<Aes256> {
        let key = self.key.as_ref()?;
        Aes256::new_from_slice(key.as_bytes()).ok()
    }

    /// Decrypted body with its fill still attached, and the header pad
    fn decrypt_blocks(&self, data: &[u8]) -> Option<(Vec<u8>, usize)> {
        let cipher = self.block_cipher()?;
        if data.len() < HEADER_SIZE {
            return None;
        }

        let pad = usize::from(data[0]);
        let mut body = data[HEADER_SIZE..].to_vec();
        if body.len() % BLOCK_SIZE != 0 || pad > BLOCK_SIZE || pad > body.len() {
            return None;
        }

        for chunk in body.chunks_exact_mut(BLOCK_SIZE) {
            cipher.decrypt_block(aes::Block::from_mut_slice(chunk));
        }
        Some((body, pad))
    }

    /// Decrypt and require the fill written by [`CipherProvider::encrypt_bytes`]
    ///
    /// Every fill byte must equal the header pad, so a wrong key is
    /// rejected instead of yielding garbage.
    pub fn decrypt_bytes_checked(&self, data: &[u8]) -> Option<Vec<u8>> {
        let (mut body, pad) = self.decrypt_blocks(data)?;
        if pad == 0 {
            body.zeroize();
            return None;
        }
        let content = body.len() - pad;
        if body[content..].iter().any(|&byte| usize::from(byte) != pad) {
            body.zeroize();
            return None;
        }
        body.truncate(content);
        Some(body)
    }

    /// Checked decryption of UTF-16LE text
    pub fn decrypt_text_checked(&self, data: &[u8]) -> Option<String> {
        let plain = Zeroizing::new(self.decrypt_bytes_checked(data)?);
        from_utf16le(&plain)
    }
}

impl CipherProvider for LegacyCipher {
    fn unlock(&mut self, password: &str) -> bool {
        if password.is_empty() {
            self.key = None;
            return false;
        }
        self.key = Some(legacy_key(password));
        true
    }

    fn lock(&mut self) {
        self.key = None;
    }

    fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    fn decrypt_bytes(&self, data: &[u8]) -> Option<Vec<u8>> {
        let (mut body, pad) = self.decrypt_blocks(data)?;
        body.truncate(body.len() - pad);
        Some(body)
    }

    fn decrypt_text(&self, data: &[u8]) -> Option<String> {
        let plain = Zeroizing::new(self.decrypt_bytes(data)?);
        from_utf16le(&plain)
    }

    fn encrypt_bytes(&self, plain: &[u8]) -> Option<Vec<u8>> {
        let cipher = self.block_cipher()?;

        // PKCS-style: always pad, a full block when already aligned
        let pad = BLOCK_SIZE - plain.len() % BLOCK_SIZE;
        let mut output = Vec::with_capacity(HEADER_SIZE + plain.len() + pad);
        output.extend_from_slice(&[pad as u8, 0, 0, 0]);
        output.extend_from_slice(plain);
        output.resize(HEADER_SIZE + plain.len() + pad, pad as u8);

        for chunk in output[HEADER_SIZE..].chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(aes::Block::from_mut_slice(chunk));
        }
        Some(output)
    }

    fn encrypt(&self, text: &str) -> Option<Vec<u8>> {
        let plain = Zeroizing::new(utf16le(text));
        self.encrypt_bytes(&plain)
    }
}
