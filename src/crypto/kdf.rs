//! Password-based key derivation (PBKDF2) and round calibration
//!
//! - [`derive`] runs PBKDF2 over HMAC with the selected hash
//! - [`calibrate`] measures how many rounds fit in a wall-clock budget
//!
//! The calibrated count is persisted in the database metadata so every
//! later unlock reproduces the same key.

use std::time::{Duration, Instant};

use hmac::Hmac;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

/// Lower bound for a calibrated round count
pub const MIN_CALIBRATED_ROUNDS: u32 = 1000;

/// Round count used for the first calibration probe
const PROBE_START_ROUNDS: u32 = 1000;

/// A probe must take at least this long before its timing is trusted
const MIN_PROBE_DURATION: Duration = Duration::from_millis(10);

/// Hash function underlying the HMAC pseudo-random function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrfHash {
    Sha1,
    Sha256,
    Sha512,
}

impl PrfHash {
    /// Derived key length in bytes (128-bit for SHA-1, 256-bit otherwise)
    pub fn key_len(self) -> usize {
        match self {
            PrfHash::Sha1 => 16,
            PrfHash::Sha256 | PrfHash::Sha512 => 32,
        }
    }
}

/// Derive a key from a password and salt
///
/// Pure function: identical inputs always give identical bytes.
/// The output is zeroized when dropped.
///
/// # Errors
///
/// Returns `WalletError::KeyDerivation` if `rounds` is zero.
pub fn derive(password: &[u8], salt: &[u8], rounds: u32, prf: PrfHash) -> Result<Zeroizing<Vec<u8>>> {
    if rounds == 0 {
        return Err(WalletError::KeyDerivation("round count must be positive".to_string()));
    }

    let mut output = Zeroizing::new(vec![0u8; prf.key_len()]);
    let outcome = match prf {
        PrfHash::Sha1 => pbkdf2::pbkdf2::<Hmac<Sha1>>(password, salt, rounds, &mut output),
        PrfHash::Sha256 => pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, rounds, &mut output),
        PrfHash::Sha512 => pbkdf2::pbkdf2::<Hmac<Sha512>>(password, salt, rounds, &mut output),
    };
    outcome.map_err(|e| WalletError::KeyDerivation(format!("pbkdf2 failed: {e}")))?;

    Ok(output)
}

/// Measure how many rounds fit in `target_ms` on this machine
///
/// Blocks the caller for roughly the requested budget. The probe doubles
/// its round count until a single run is long enough to time reliably,
/// then extrapolates linearly.
pub fn calibrate(password_len: usize, salt_len: usize, target_ms: u64, prf: PrfHash) -> u32 {
    if target_ms == 0 {
        return MIN_CALIBRATED_ROUNDS;
    }

    let password = vec![b'p'; password_len];
    let salt = vec![0x5au8; salt_len];
    let target = Duration::from_millis(target_ms);
    let threshold = std::cmp::max(MIN_PROBE_DURATION, target / 8);

    let mut rounds = PROBE_START_ROUNDS;
    let mut spent = Duration::ZERO;
    loop {
        let started = Instant::now();
        // Zero rounds is the only failure and the probe never uses it
        let _ = derive(&password, &salt, rounds, prf);
        let elapsed = started.elapsed();
        spent += elapsed;

        let measurable = elapsed >= threshold || spent >= target;
        if (measurable && !elapsed.is_zero()) || rounds >= u32::MAX / 2 {
            let per_round = elapsed.as_secs_f64() / f64::from(rounds);
            let estimate = if per_round > 0.0 {
                target.as_secs_f64() / per_round
            } else {
                f64::from(u32::MAX)
            };
            let calibrated = estimate.clamp(f64::from(MIN_CALIBRATED_ROUNDS), f64::from(u32::MAX)) as u32;
            tracing::debug!(rounds = calibrated, target_ms, "calibrated pbkdf2 rounds");
            return calibrated;
        }
        rounds = rounds.saturating_mul(2);
    }
}
