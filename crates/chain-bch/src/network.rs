use std::str::FromStr;

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::error::BchError;

/// Supported Bitcoin Cash networks.
///
/// Legacy base58 addresses share their version bytes with the corresponding
/// Bitcoin network, so parsing and script construction go through the
/// `bitcoin` crate's network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BchNetwork {
    Mainnet,
    Testnet,
    Regtest,
}

impl BchNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BchNetwork::Mainnet => Network::Bitcoin,
            BchNetwork::Testnet => Network::Testnet,
            BchNetwork::Regtest => Network::Regtest,
        }
    }
}

impl std::fmt::Display for BchNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BchNetwork::Mainnet => write!(f, "mainnet"),
            BchNetwork::Testnet => write!(f, "testnet"),
            BchNetwork::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for BchNetwork {
    type Err = BchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(BchNetwork::Mainnet),
            "testnet" | "test" => Ok(BchNetwork::Testnet),
            "regtest" => Ok(BchNetwork::Regtest),
            other => Err(BchError::InvalidNetwork(other.to_string())),
        }
    }
}
