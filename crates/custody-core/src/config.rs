//! Service configuration from environment variables.
//!
//! Unparseable values are replaced by their defaults with a warning that
//! names the variable.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chain_bch::fee::{FeeEstimator, FeeRate};
use chain_bch::network::BchNetwork;
use chain_bch::transaction::{Assembler, FeePolicy, DUST_THRESHOLD_SAT};

pub const ENV_NETWORK: &str = "CUSTODY_NETWORK";
pub const ENV_FEE_RATE: &str = "CUSTODY_FEE_RATE";
pub const ENV_FEE_POLICY: &str = "CUSTODY_FEE_POLICY";
pub const ENV_DUST_THRESHOLD: &str = "CUSTODY_DUST_THRESHOLD";
pub const ENV_API_URL: &str = "CUSTODY_API_URL";
pub const ENV_HTTP_TIMEOUT: &str = "CUSTODY_HTTP_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustodyConfig {
    pub network: BchNetwork,
    /// Satoshis per 1000 bytes.
    pub fee_rate: FeeRate,
    pub fee_policy: FeePolicy,
    pub dust_threshold_sat: u64,
    /// Base URL of the REST endpoint used for coin lookups and broadcast.
    pub api_url: String,
    pub http_timeout: Duration,
}

impl CustodyConfig {
    /// Load configuration from the process environment.
    ///
    /// - `CUSTODY_NETWORK`: mainnet (default), testnet or regtest
    /// - `CUSTODY_FEE_RATE`: satoshis per kilobyte (default 1000)
    /// - `CUSTODY_FEE_POLICY`: `deduct` (default) or `add`
    /// - `CUSTODY_DUST_THRESHOLD`: satoshis (default 100)
    /// - `CUSTODY_API_URL`: REST base URL (default http://localhost:3000)
    /// - `CUSTODY_HTTP_TIMEOUT_SECS`: default 30
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let network = parse_or(&lookup, ENV_NETWORK, defaults.network, |s| s.parse().ok());
        let fee_rate = parse_or(&lookup, ENV_FEE_RATE, defaults.fee_rate, |s| {
            u64::from_str(s.trim()).ok().map(FeeRate::from_sat_per_kb)
        });
        let fee_policy = parse_or(&lookup, ENV_FEE_POLICY, defaults.fee_policy, |s| s.parse().ok());
        let dust_threshold_sat = parse_or(&lookup, ENV_DUST_THRESHOLD, defaults.dust_threshold_sat, |s| {
            u64::from_str(s.trim()).ok()
        });
        let http_timeout = parse_or(&lookup, ENV_HTTP_TIMEOUT, defaults.http_timeout, |s| {
            u64::from_str(s.trim())
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        });
        let api_url = lookup(ENV_API_URL)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        log::info!(
            "custody config: network={}, fee_rate={} sat/kB, policy={:?}, dust={} sat, api={}",
            network,
            fee_rate.sat_per_kb(),
            fee_policy,
            dust_threshold_sat,
            api_url
        );

        Self {
            network,
            fee_rate,
            fee_policy,
            dust_threshold_sat,
            api_url,
            http_timeout,
        }
    }

    /// Transaction assembler configured with this fee rate, policy and dust threshold.
    pub fn assembler(&self) -> Assembler {
        Assembler::new(FeeEstimator::new(self.fee_rate), self.fee_policy)
            .with_dust_threshold(self.dust_threshold_sat)
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            network: BchNetwork::Mainnet,
            fee_rate: FeeRate::DEFAULT,
            fee_policy: FeePolicy::DeductFromAmount,
            dust_threshold_sat: DUST_THRESHOLD_SAT,
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

fn parse_or<T: std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match parse(&raw) {
            Some(value) => value,
            None => {
                log::warn!("{key}={raw:?} is not valid, using {default:?}");
                default
            }
        },
    }
}
