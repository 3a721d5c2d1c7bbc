//! The transfer pipeline.
//!
//! `send` runs FETCH_COINS -> SELECT -> ESTIMATE_FEE -> ASSEMBLE -> SIGN ->
//! BROADCAST in order and stops at the first failure. Nothing is signed
//! until a complete plan exists, and nothing is broadcast unless every
//! input was signed.

use chain_bch::address::parse_address;
use chain_bch::signer::sign_plan;
use chain_bch::transaction::{Assembler, TransactionPlan};
use chain_bch::utxo::{select_coins, total_sat, unconfirmed_sat, Coin, CoinSelection, CoinSet};
use secrecy::ExposeSecret;

use crate::collaborators::{AddressDirectory, CoinSource, KeyStore, Network};
use crate::config::CustodyConfig;
use crate::error::CustodyError;
use crate::types::{BalanceSummary, FeeQuote, Stage, TransferRequest, TransferResult};

/// Custodial transfer service over its four collaborators.
///
/// Holds no mutable state; concurrent calls are independent.
pub struct TransferService<S, K, D, N> {
    config: CustodyConfig,
    assembler: Assembler,
    coins: S,
    keys: K,
    directory: D,
    network: N,
}

impl<S, K, D, N> TransferService<S, K, D, N>
where
    S: CoinSource,
    K: KeyStore,
    D: AddressDirectory,
    N: Network,
{
    pub fn new(config: CustodyConfig, coins: S, keys: K, directory: D, network: N) -> Self {
        let assembler = config.assembler();
        Self {
            config,
            assembler,
            coins,
            keys,
            directory,
            network,
        }
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// The custodial address of `user_id`, checked against the configured network.
    pub async fn address(&self, user_id: &str) -> Result<String, CustodyError> {
        let address = self
            .directory
            .address_for_user(user_id)
            .await
            .map_err(|e| failed(Stage::Validate, user_id, e.into()))?;

        parse_address(&address, self.config.network).map_err(|e| {
            failed(
                Stage::Validate,
                user_id,
                CustodyError::Lookup(format!("stored address for {user_id} is unusable: {e}")),
            )
        })?;
        Ok(address)
    }

    /// Confirmed and unconfirmed balance of `user_id`'s address.
    pub async fn balance(&self, user_id: &str) -> Result<BalanceSummary, CustodyError> {
        let address = self.address(user_id).await?;
        let coins = self.fetch_coins(user_id, &address).await?;
        let unconfirmed_sat = unconfirmed_sat(&coins);
        Ok(BalanceSummary {
            balance_sat: total_sat(&coins) - unconfirmed_sat,
            unconfirmed_sat,
            coin_count: coins.len(),
            address,
        })
    }

    /// Fee a send of `amount_sat` would pay against the current coin set.
    ///
    /// Runs the same selection and sizing as [`send`](Self::send) and has no
    /// side effects, so repeated calls over unchanged coins agree.
    pub async fn quote_fee(&self, user_id: &str, amount_sat: u64) -> Result<FeeQuote, CustodyError> {
        if amount_sat == 0 {
            return Err(failed(
                Stage::Validate,
                user_id,
                CustodyError::InvalidRequest("amount must be positive".into()),
            ));
        }
        log::info!("fee quote for {user_id}: {amount_sat} sat");

        let address = self.address(user_id).await?;
        let coins = self.fetch_coins(user_id, &address).await?;
        let selection = self.select(user_id, &coins, amount_sat);

        let stage = failure_stage(&selection, Stage::EstimateFee);
        let shape = self
            .assembler
            .shape(&selection, amount_sat)
            .map_err(|e| failed(stage, user_id, e.into()))?;
        log::debug!(
            "{user_id}: {} inputs, {} outputs, fee {} sat",
            shape.input_count,
            shape.output_count,
            shape.fee_sat
        );

        Ok(FeeQuote {
            estimated_fee_sat: shape.fee_sat,
            input_count: shape.input_count,
            output_count: shape.output_count,
        })
    }

    /// Move funds from the sender's custodial address to `receiving_address`.
    ///
    /// With the default deduct policy the receiver gets the requested amount
    /// minus the fee. On `BroadcastStatusUnknown` the transaction may still
    /// confirm; callers must reconcile before retrying.
    pub async fn send(&self, request: &TransferRequest) -> Result<TransferResult, CustodyError> {
        let user_id = request.sender_user_id.as_str();
        log::info!(
            "transfer requested: {user_id} -> {} ({} sat)",
            request.receiving_address,
            request.amount_sat
        );

        request
            .validate()
            .map_err(|e| failed(Stage::Validate, user_id, e))?;
        parse_address(&request.receiving_address, self.config.network)
            .map_err(|e| failed(Stage::Validate, user_id, e.into()))?;

        let sender_address = self.address(user_id).await?;
        let coins = self.fetch_coins(user_id, &sender_address).await?;
        let selection = self.select(user_id, &coins, request.amount_sat);
        let plan = self.assemble(user_id, &selection, request, &sender_address)?;

        let wif = self
            .keys
            .private_key(user_id)
            .await
            .map_err(|e| failed(Stage::Sign, user_id, e.into()))?;
        let signed = sign_plan(&plan, wif.expose_secret(), self.config.network)
            .map_err(|e| failed(Stage::Sign, user_id, e.into()))?;
        drop(wif);
        log::debug!("{user_id}: signed {} ({} bytes)", signed.txid, signed.raw.len());

        let txid = self
            .network
            .broadcast(&signed.raw)
            .await
            .map_err(|e| failed(Stage::Broadcast, user_id, e.into()))?;
        if txid != signed.txid {
            log::warn!(
                "{user_id}: network reported txid {txid}, locally computed {}",
                signed.txid
            );
        }

        let result = TransferResult {
            sender_id: user_id.to_string(),
            amount_transferred_sat: plan.recipient_sat(),
            fee_paid_sat: plan.fee_sat,
            receiving_address: request.receiving_address.clone(),
            txid,
        };
        log::info!(
            "{}: {user_id} sent {} sat to {}, fee {} sat, txid {}",
            Stage::Done,
            result.amount_transferred_sat,
            result.receiving_address,
            result.fee_paid_sat,
            result.txid
        );
        Ok(result)
    }

    async fn fetch_coins(&self, user_id: &str, address: &str) -> Result<CoinSet, CustodyError> {
        let coins = self
            .coins
            .unspent_outputs(address)
            .await
            .map_err(|e| failed(Stage::FetchCoins, user_id, e.into()))?;
        log::debug!("{user_id}: {} coins at {address}", coins.len());
        Ok(coins)
    }

    fn select(&self, user_id: &str, coins: &[Coin], target_sat: u64) -> CoinSelection {
        let selection = select_coins(coins, target_sat);
        log::debug!(
            "{}: {user_id} selected {} of {} coins ({} sat)",
            Stage::Select,
            selection.inputs().len(),
            coins.len(),
            selection.total_sat()
        );
        selection
    }

    fn assemble(
        &self,
        user_id: &str,
        selection: &CoinSelection,
        request: &TransferRequest,
        change_address: &str,
    ) -> Result<TransactionPlan, CustodyError> {
        let stage = failure_stage(selection, Stage::Assemble);
        let plan = self
            .assembler
            .assemble(
                selection,
                request.amount_sat,
                request.receiving_address.trim(),
                change_address,
            )
            .map_err(|e| failed(stage, user_id, e.into()))?;
        log::debug!(
            "{}: {user_id} recipient {} sat, change {:?}, fee {} sat",
            Stage::Assemble,
            plan.recipient_sat(),
            plan.change_sat(),
            plan.fee_sat
        );
        Ok(plan)
    }
}

/// Coins that cannot cover the target are a selection failure wherever
/// they are detected.
fn failure_stage(selection: &CoinSelection, otherwise: Stage) -> Stage {
    if selection.is_insufficient() {
        Stage::Select
    } else {
        otherwise
    }
}

fn failed(stage: Stage, user_id: &str, err: CustodyError) -> CustodyError {
    log::warn!("{stage} failed for {user_id}: {err}");
    err
}
