use serde::{Deserialize, Serialize};

/// Serialized size of a P2PKH input with a compressed public key.
/// Breakdown: outpoint 36 + script length 1 + scriptSig ~107 + sequence 4.
pub const P2PKH_INPUT_BYTES: u64 = 148;

/// Serialized size of a P2PKH output: value 8 + script length 1 + script 25.
pub const P2PKH_OUTPUT_BYTES: u64 = 34;

/// Fixed transaction overhead: version 4 + input count 1 + output count 1 + locktime 4.
pub const TX_OVERHEAD_BYTES: u64 = 10;

/// Locking script family of the inputs and outputs being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScriptType {
    #[default]
    P2pkh,
}

/// Estimate the serialized size of a transaction in bytes.
///
/// Zero inputs is not a valid transaction, but callers are responsible for
/// rejecting it; this returns the fixed overhead plus outputs.
pub fn estimate_bytes(num_inputs: usize, num_outputs: usize, script_type: ScriptType) -> u64 {
    let (input_bytes, output_bytes) = match script_type {
        ScriptType::P2pkh => (P2PKH_INPUT_BYTES, P2PKH_OUTPUT_BYTES),
    };
    TX_OVERHEAD_BYTES
        .saturating_add((num_inputs as u64).saturating_mul(input_bytes))
        .saturating_add((num_outputs as u64).saturating_mul(output_bytes))
}

/// Network fee rate, stored as satoshis per 1000 bytes so fractional
/// per-byte rates stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate {
    sat_per_kb: u64,
}

impl FeeRate {
    /// One satoshi per byte.
    pub const DEFAULT: FeeRate = FeeRate { sat_per_kb: 1_000 };

    pub const fn from_sat_per_kb(sat_per_kb: u64) -> Self {
        Self { sat_per_kb }
    }

    pub const fn from_sat_per_byte(sat_per_byte: u64) -> Self {
        Self {
            sat_per_kb: sat_per_byte.saturating_mul(1_000),
        }
    }

    pub fn sat_per_kb(self) -> u64 {
        self.sat_per_kb
    }

    /// Fee for `bytes`, truncated toward zero.
    pub fn fee_for_bytes(self, bytes: u64) -> u64 {
        let fee = u128::from(bytes) * u128::from(self.sat_per_kb) / 1_000;
        u64::try_from(fee).unwrap_or(u64::MAX)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Computes the fee for a concrete input/output shape at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeEstimator {
    rate: FeeRate,
    script_type: ScriptType,
}

impl FeeEstimator {
    pub fn new(rate: FeeRate) -> Self {
        Self {
            rate,
            script_type: ScriptType::P2pkh,
        }
    }

    pub fn rate(&self) -> FeeRate {
        self.rate
    }

    /// Fee in satoshis for `num_inputs` inputs and `num_outputs` outputs.
    pub fn estimate(&self, num_inputs: usize, num_outputs: usize) -> u64 {
        self.rate
            .fee_for_bytes(estimate_bytes(num_inputs, num_outputs, self.script_type))
    }
}
