//! # key-vault
//!
//! Sealing of custodial private keys at rest: Argon2id password hashing,
//! AES-256-GCM encryption, and zeroizing of every intermediate secret.

pub mod error;
pub mod kdf;
pub mod sealed;

pub use error::VaultError;
pub use sealed::{open_private_key, seal_private_key, SealedKey};
