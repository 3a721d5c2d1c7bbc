//! Custodial Bitcoin Cash transfers.
//!
//! [`TransferService`] composes coin lookup, coin selection, fee estimation,
//! transaction assembly, signing and broadcast into two request/response
//! operations: a fee quote and a send. Storage, key custody and the network
//! are reached only through the async traits in [`collaborators`].
//!
//! Two concurrent sends from the same address may select the same coin;
//! nothing here serializes them and the network rejects whichever broadcast
//! arrives second.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod memory;
pub mod rest;
pub mod service;
pub mod types;

pub use collaborators::{AddressDirectory, CoinSource, KeyStore, Network};
pub use config::CustodyConfig;
pub use error::CustodyError;
pub use service::TransferService;
pub use types::{BalanceSummary, FeeQuote, Stage, TransferRequest, TransferResult};
