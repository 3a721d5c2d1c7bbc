//! Bitcoin Cash chain support for the custodial sender.
//!
//! Provides P2PKH byte counting and fee estimation, largest-first coin
//! selection with dust consolidation, transaction planning, and
//! SIGHASH_ALL|FORKID signing.

pub mod address;
pub mod error;
pub mod fee;
pub mod network;
pub mod signer;
pub mod transaction;
pub mod utxo;

pub use error::BchError;
