use chain_bch::BchError;
use thiserror::Error;

use crate::collaborators::{BroadcastError, KeyStoreError, LookupError};

/// Every way a fee quote or send can fail.
///
/// Exactly one of these is returned per failed request. Apart from
/// `BroadcastStatusUnknown`, none of them leaves anything on chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("fee exceeds funds: {0}")]
    FeeExceedsFunds(String),

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast rejected: {reason}")]
    BroadcastRejected { reason: String },

    #[error("broadcast status unknown: {0}")]
    BroadcastStatusUnknown(String),
}

impl CustodyError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CustodyError::InvalidRequest(_) => "InvalidRequest",
            CustodyError::InsufficientFunds(_) => "InsufficientFunds",
            CustodyError::FeeExceedsFunds(_) => "FeeExceedsFunds",
            CustodyError::Lookup(_) => "LookupError",
            CustodyError::Signing(_) => "SigningError",
            CustodyError::BroadcastRejected { .. } => "BroadcastRejected",
            CustodyError::BroadcastStatusUnknown(_) => "BroadcastStatusUnknown",
        }
    }
}

impl From<BchError> for CustodyError {
    fn from(e: BchError) -> Self {
        match e {
            BchError::InsufficientFunds { .. } => CustodyError::InsufficientFunds(e.to_string()),
            BchError::FeeExceedsFunds { .. } => CustodyError::FeeExceedsFunds(e.to_string()),
            BchError::AmountBelowDust { .. }
            | BchError::InvalidAddress(_)
            | BchError::InvalidNetwork(_)
            | BchError::TransactionBuildError(_) => CustodyError::InvalidRequest(e.to_string()),
            BchError::InvalidPrivateKey(_) | BchError::SigningError(_) => {
                CustodyError::Signing(e.to_string())
            }
        }
    }
}

impl From<LookupError> for CustodyError {
    fn from(e: LookupError) -> Self {
        CustodyError::Lookup(e.to_string())
    }
}

impl From<KeyStoreError> for CustodyError {
    fn from(e: KeyStoreError) -> Self {
        CustodyError::Signing(e.to_string())
    }
}

impl From<BroadcastError> for CustodyError {
    fn from(e: BroadcastError) -> Self {
        match e {
            BroadcastError::Rejected { reason } => CustodyError::BroadcastRejected { reason },
            BroadcastError::StatusUnknown(detail) => CustodyError::BroadcastStatusUnknown(detail),
            BroadcastError::Unreachable(_) => CustodyError::Lookup(e.to_string()),
        }
    }
}
