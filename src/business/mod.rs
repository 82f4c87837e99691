//! Business logic layer for SWL wallets
//!
//! This module provides the high-level Wallet API: opening and creating
//! wallets, cipher selection, typed record access and the encryption
//! upgrade.

pub mod wallet;
pub mod upgrade;

pub use wallet::Wallet;
