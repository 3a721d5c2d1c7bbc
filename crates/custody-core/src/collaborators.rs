//! Interfaces to the systems the transfer pipeline depends on.
//!
//! Each call is a single request that either yields a value or a fault.
//! Timeouts belong to the implementation; the pipeline never retries.

use std::future::Future;
use std::sync::Arc;

use chain_bch::utxo::CoinSet;
use secrecy::SecretString;
use thiserror::Error;

/// Failure to read a record or reach the backing service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Failure to produce a usable private key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("no key for user {0}")]
    NotFound(String),

    #[error("key decryption failed: {0}")]
    Decryption(String),
}

/// Failure to get a transaction accepted by the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BroadcastError {
    /// The network answered and refused the transaction.
    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// The transaction may or may not have been accepted.
    #[error("status unknown: {0}")]
    StatusUnknown(String),

    /// The network could not be contacted; nothing was submitted.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

/// Source of the unspent outputs of an address.
pub trait CoinSource: Send + Sync {
    fn unspent_outputs(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<CoinSet, LookupError>> + Send;
}

/// Custodial key storage.
pub trait KeyStore: Send + Sync {
    /// The WIF-encoded private key controlling the user's address.
    fn private_key(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<SecretString, KeyStoreError>> + Send;
}

/// Maps users to their custodial address.
pub trait AddressDirectory: Send + Sync {
    fn address_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<String, LookupError>> + Send;
}

/// Transaction submission.
pub trait Network: Send + Sync {
    /// Submit a serialized transaction and return its id.
    fn broadcast(
        &self,
        raw_tx: &[u8],
    ) -> impl Future<Output = Result<String, BroadcastError>> + Send;
}

impl<T: CoinSource> CoinSource for Arc<T> {
    fn unspent_outputs(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<CoinSet, LookupError>> + Send {
        (**self).unspent_outputs(address)
    }
}

impl<T: KeyStore> KeyStore for Arc<T> {
    fn private_key(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<SecretString, KeyStoreError>> + Send {
        (**self).private_key(user_id)
    }
}

impl<T: AddressDirectory> AddressDirectory for Arc<T> {
    fn address_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<String, LookupError>> + Send {
        (**self).address_for_user(user_id)
    }
}

impl<T: Network> Network for Arc<T> {
    fn broadcast(
        &self,
        raw_tx: &[u8],
    ) -> impl Future<Output = Result<String, BroadcastError>> + Send {
        (**self).broadcast(raw_tx)
    }
}
