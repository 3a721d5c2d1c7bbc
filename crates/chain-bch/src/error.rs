use thiserror::Error;

/// Bitcoin Cash chain operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BchError {
    #[error("insufficient funds: have {available_sat} sat, need {required_sat} sat")]
    InsufficientFunds { available_sat: u64, required_sat: u64 },

    #[error("fee of {fee_sat} sat exceeds spendable funds of {available_sat} sat")]
    FeeExceedsFunds { fee_sat: u64, available_sat: u64 },

    #[error("amount of {amount_sat} sat is at or below the dust threshold of {threshold_sat} sat")]
    AmountBelowDust { amount_sat: u64, threshold_sat: u64 },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}
