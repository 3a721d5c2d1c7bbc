//! Coin lookup and broadcast over an Esplora-style REST API.
//!
//! - `GET {base}/address/{address}/utxo` returns
//!   `[{"txid", "vout", "value", "status": {"confirmed"}}, ...]`
//! - `POST {base}/tx` takes the raw transaction as hex and answers with the txid

use std::time::Duration;

use chain_bch::utxo::{Coin, CoinSet};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::collaborators::{BroadcastError, CoinSource, LookupError, Network};
use crate::config::CustodyConfig;

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    txid: String,
    vout: u32,
    value: u64,
    status: Option<UtxoStatus>,
}

#[derive(Debug, Deserialize)]
struct UtxoStatus {
    confirmed: bool,
}

/// HTTP client for a single REST endpoint.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &CustodyConfig) -> Result<Self, LookupError> {
        Self::new(config.api_url.clone(), config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CoinSource for RestClient {
    async fn unspent_outputs(&self, address: &str) -> Result<CoinSet, LookupError> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        log::debug!("GET {url}");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Unavailable(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(format!("address {address}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| LookupError::Unavailable(format!("reading utxo response: {e}")))?;
        if !status.is_success() {
            return Err(LookupError::Unavailable(format!("GET {url} returned {status}: {body}")));
        }

        parse_utxos(address, &body)
    }
}

impl Network for RestClient {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, BroadcastError> {
        let url = format!("{}/tx", self.base_url);
        log::debug!("POST {url} ({} bytes)", raw_tx.len());

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(hex::encode(raw_tx))
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BroadcastError::StatusUnknown(format!("reading broadcast response: {e}")))?;

        classify_broadcast_response(status, &body)
    }
}

/// Decode an Esplora utxo listing into coins owned by `address`.
pub fn parse_utxos(address: &str, body: &str) -> Result<CoinSet, LookupError> {
    let entries: Vec<UtxoEntry> = serde_json::from_str(body)
        .map_err(|e| LookupError::Unavailable(format!("malformed utxo response: {e}")))?;

    Ok(entries
        .into_iter()
        .map(|entry| Coin {
            txid: entry.txid,
            vout: entry.vout,
            amount_sat: entry.value,
            address: address.to_string(),
            confirmed: entry.status.map_or(true, |status| status.confirmed),
        })
        .collect())
}

/// A request that never connected was not submitted. Anything later may
/// have reached the node.
fn classify_send_error(err: reqwest::Error) -> BroadcastError {
    if err.is_connect() {
        BroadcastError::Unreachable(err.to_string())
    } else {
        BroadcastError::StatusUnknown(err.to_string())
    }
}

fn classify_broadcast_response(status: StatusCode, body: &str) -> Result<String, BroadcastError> {
    let body = body.trim();
    if status.is_success() {
        return if is_txid(body) {
            Ok(body.to_string())
        } else {
            Err(BroadcastError::StatusUnknown(format!(
                "accepted with unexpected body {body:?}"
            )))
        };
    }
    // 408 says nothing about whether the node already took the transaction.
    if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
        let reason = if body.is_empty() {
            status.to_string()
        } else {
            body.to_string()
        };
        return Err(BroadcastError::Rejected { reason });
    }
    Err(BroadcastError::StatusUnknown(format!("{status}: {body}")))
}

fn is_txid(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
