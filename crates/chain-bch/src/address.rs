use bitcoin::address::{Address, AddressType, NetworkUnchecked};
use bitcoin::PublicKey;

use crate::error::BchError;
use crate::network::BchNetwork;

/// Parse a legacy base58 address and check it against `network`.
///
/// Only P2PKH and P2SH are accepted; segwit and taproot encodings do not exist
/// on Bitcoin Cash.
pub fn parse_address(address: &str, network: BchNetwork) -> Result<Address, BchError> {
    let checked = address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BchError::InvalidAddress(format!("failed to parse {address:?}: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BchError::InvalidAddress(format!("{address} is not a {network} address: {e}")))?;

    match checked.address_type() {
        Some(AddressType::P2pkh) | Some(AddressType::P2sh) => Ok(checked),
        other => Err(BchError::InvalidAddress(format!(
            "unsupported address type {other:?} for {address}"
        ))),
    }
}

/// Validate an address string for the given network.
///
/// Returns `Ok(false)` for a well-formed address of another network or an
/// unsupported type, and an error only when the string cannot be parsed.
pub fn validate_address(address: &str, network: BchNetwork) -> Result<bool, BchError> {
    let parsed = address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BchError::InvalidAddress(format!("failed to parse address: {e}")))?;

    if !parsed.is_valid_for_network(network.to_bitcoin_network()) {
        return Ok(false);
    }
    Ok(parse_address(address, network).is_ok())
}

/// The P2PKH address controlled by `public_key`.
pub fn p2pkh_address(public_key: &PublicKey, network: BchNetwork) -> String {
    Address::p2pkh(public_key.pubkey_hash(), network.to_bitcoin_network()).to_string()
}
