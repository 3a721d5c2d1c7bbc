use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BchError;
use crate::fee::FeeEstimator;
use crate::utxo::{Coin, CoinSelection};

/// Outputs at or below this value are never created.
pub const DUST_THRESHOLD_SAT: u64 = 100;

/// Who pays the network fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// The fee comes out of the amount sent; the receiver gets `target - fee`.
    #[default]
    DeductFromAmount,
    /// The receiver gets exactly `target`; the fee comes out of the change.
    AddOnTop,
}

impl FromStr for FeePolicy {
    type Err = BchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deduct" | "deduct_from_amount" => Ok(FeePolicy::DeductFromAmount),
            "add" | "add_on_top" => Ok(FeePolicy::AddOnTop),
            other => Err(BchError::TransactionBuildError(format!(
                "unknown fee policy: {other}"
            ))),
        }
    }
}

/// Input/output counts and amounts of a planned transaction, without addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanShape {
    pub input_count: usize,
    pub output_count: usize,
    pub recipient_sat: u64,
    pub change_sat: Option<u64>,
    /// Fee actually paid, including any sub-dust remainder that was not returned.
    pub fee_sat: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputRole {
    Change,
    Recipient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub address: String,
    pub amount_sat: u64,
    pub role: OutputRole,
}

/// An unsigned spend: inputs, ordered outputs and the fee they leave behind.
///
/// `input_total() == output_total() + fee_sat` always holds for plans built by
/// [`Assembler::assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    pub inputs: Vec<Coin>,
    pub outputs: Vec<PlannedOutput>,
    pub fee_sat: u64,
}

impl TransactionPlan {
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|c| c.amount_sat).sum()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount_sat).sum()
    }

    pub fn recipient_sat(&self) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.role == OutputRole::Recipient)
            .map(|o| o.amount_sat)
            .sum()
    }

    pub fn change_sat(&self) -> Option<u64> {
        self.outputs
            .iter()
            .find(|o| o.role == OutputRole::Change)
            .map(|o| o.amount_sat)
    }
}

/// Turns a coin selection into a transaction plan with an exact fee.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    estimator: FeeEstimator,
    policy: FeePolicy,
    dust_threshold_sat: u64,
}

impl Assembler {
    pub fn new(estimator: FeeEstimator, policy: FeePolicy) -> Self {
        Self {
            estimator,
            policy,
            dust_threshold_sat: DUST_THRESHOLD_SAT,
        }
    }

    pub fn with_dust_threshold(mut self, dust_threshold_sat: u64) -> Self {
        self.dust_threshold_sat = dust_threshold_sat;
        self
    }

    pub fn policy(&self) -> FeePolicy {
        self.policy
    }

    /// Compute the output layout and fee for spending `selection` towards `target_sat`.
    ///
    /// The fee is always estimated for the real number of inputs and outputs,
    /// so a change output is only counted when one will actually be created.
    pub fn shape(&self, selection: &CoinSelection, target_sat: u64) -> Result<PlanShape, BchError> {
        if let CoinSelection::InsufficientFunds {
            available_sat,
            target_sat,
        } = selection
        {
            return Err(BchError::InsufficientFunds {
                available_sat: *available_sat,
                required_sat: *target_sat,
            });
        }

        let input_count = selection.inputs().len();
        let total_sat = selection.total_sat();
        if input_count == 0 || total_sat < target_sat {
            return Err(BchError::InsufficientFunds {
                available_sat: total_sat,
                required_sat: target_sat,
            });
        }
        let remainder = total_sat - target_sat;

        match self.policy {
            FeePolicy::DeductFromAmount => {
                let has_change = remainder > self.dust_threshold_sat;
                let output_count = if has_change { 2 } else { 1 };
                let fee = self.estimator.estimate(input_count, output_count);

                // The selection must cover target + fee even though the
                // receiver, not the change, is charged for it.
                if remainder < fee {
                    return Err(BchError::FeeExceedsFunds {
                        fee_sat: fee,
                        available_sat: remainder,
                    });
                }

                let recipient_sat = target_sat
                    .checked_sub(fee)
                    .filter(|amount| *amount > self.dust_threshold_sat)
                    .ok_or(BchError::FeeExceedsFunds {
                        fee_sat: fee,
                        available_sat: target_sat,
                    })?;

                let (change_sat, forfeited) = if has_change {
                    (Some(remainder), 0)
                } else {
                    (None, remainder)
                };

                Ok(PlanShape {
                    input_count,
                    output_count,
                    recipient_sat,
                    change_sat,
                    fee_sat: fee + forfeited,
                })
            }
            FeePolicy::AddOnTop => {
                if target_sat <= self.dust_threshold_sat {
                    return Err(BchError::AmountBelowDust {
                        amount_sat: target_sat,
                        threshold_sat: self.dust_threshold_sat,
                    });
                }

                let fee_with_change = self.estimator.estimate(input_count, 2);
                if let Some(change) = remainder
                    .checked_sub(fee_with_change)
                    .filter(|change| *change > self.dust_threshold_sat)
                {
                    return Ok(PlanShape {
                        input_count,
                        output_count: 2,
                        recipient_sat: target_sat,
                        change_sat: Some(change),
                        fee_sat: fee_with_change,
                    });
                }

                // Change would be dust: drop it and let the remainder go to the fee.
                let fee = self.estimator.estimate(input_count, 1);
                if remainder < fee {
                    return Err(BchError::FeeExceedsFunds {
                        fee_sat: fee,
                        available_sat: remainder,
                    });
                }

                Ok(PlanShape {
                    input_count,
                    output_count: 1,
                    recipient_sat: target_sat,
                    change_sat: None,
                    fee_sat: remainder,
                })
            }
        }
    }

    /// Build the unsigned plan. The change output, if any, precedes the
    /// recipient output so signing indices are stable.
    pub fn assemble(
        &self,
        selection: &CoinSelection,
        target_sat: u64,
        recipient: &str,
        change_address: &str,
    ) -> Result<TransactionPlan, BchError> {
        let shape = self.shape(selection, target_sat)?;

        let mut outputs = Vec::with_capacity(shape.output_count);
        if let Some(change_sat) = shape.change_sat {
            outputs.push(PlannedOutput {
                address: change_address.to_string(),
                amount_sat: change_sat,
                role: OutputRole::Change,
            });
        }
        outputs.push(PlannedOutput {
            address: recipient.to_string(),
            amount_sat: shape.recipient_sat,
            role: OutputRole::Recipient,
        });

        let plan = TransactionPlan {
            inputs: selection.inputs().to_vec(),
            outputs,
            fee_sat: shape.fee_sat,
        };
        debug_assert_eq!(plan.input_total(), plan.output_total() + plan.fee_sat);
        Ok(plan)
    }
}
