use serde::{Deserialize, Serialize};

use crate::error::CustodyError;

/// A request to move `amount_sat` from a user's custodial address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender_user_id: String,
    pub receiving_address: String,
    pub amount_sat: u64,
}

impl TransferRequest {
    pub fn new(
        sender_user_id: impl Into<String>,
        receiving_address: impl Into<String>,
        amount_sat: u64,
    ) -> Self {
        Self {
            sender_user_id: sender_user_id.into(),
            receiving_address: receiving_address.into(),
            amount_sat,
        }
    }

    /// Shape checks that need no network or storage access.
    pub fn validate(&self) -> Result<(), CustodyError> {
        if self.sender_user_id.trim().is_empty() {
            return Err(CustodyError::InvalidRequest("sender user id is empty".into()));
        }
        if self.receiving_address.trim().is_empty() {
            return Err(CustodyError::InvalidRequest("receiving address is empty".into()));
        }
        if self.amount_sat == 0 {
            return Err(CustodyError::InvalidRequest("amount must be positive".into()));
        }
        Ok(())
    }
}

/// The fee a send of a given amount would pay right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub estimated_fee_sat: u64,
    pub input_count: usize,
    pub output_count: usize,
}

/// Record of a broadcast transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub sender_id: String,
    /// Value of the receiver output.
    pub amount_transferred_sat: u64,
    pub fee_paid_sat: u64,
    pub receiving_address: String,
    pub txid: String,
}

/// Balance of a user's custodial address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub address: String,
    /// Value of coins created in mined transactions.
    pub balance_sat: u64,
    /// Value of coins still waiting in the mempool.
    pub unconfirmed_sat: u64,
    pub coin_count: usize,
}

/// Pipeline step, used to label failures in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    FetchCoins,
    Select,
    EstimateFee,
    Assemble,
    Sign,
    Broadcast,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "VALIDATE",
            Stage::FetchCoins => "FETCH_COINS",
            Stage::Select => "SELECT",
            Stage::EstimateFee => "ESTIMATE_FEE",
            Stage::Assemble => "ASSEMBLE",
            Stage::Sign => "SIGN",
            Stage::Broadcast => "BROADCAST",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}
