use serde::{Deserialize, Serialize};

/// A single unspent transaction output controlled by a custodial address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Transaction ID as a hex string (display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
    /// Address that can spend this output.
    pub address: String,
    /// Whether the creating transaction is in a block. Unconfirmed coins are
    /// still spendable; they are only reported separately.
    #[serde(default = "confirmed_by_default")]
    pub confirmed: bool,
}

fn confirmed_by_default() -> bool {
    true
}

/// Every unspent output of one address as observed at fetch time.
pub type CoinSet = Vec<Coin>;

/// Sum of the amounts in `coins`.
pub fn total_sat(coins: &[Coin]) -> u64 {
    coins.iter().map(|c| c.amount_sat).sum()
}

/// Sum of the amounts in `coins` whose transaction is not yet mined.
pub fn unconfirmed_sat(coins: &[Coin]) -> u64 {
    coins
        .iter()
        .filter(|c| !c.confirmed)
        .map(|c| c.amount_sat)
        .sum()
}

/// Outcome of coin selection for a target amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinSelection {
    /// The largest coin alone covers the target.
    SingleInput { coin: Coin },
    /// No single coin is enough; every coin is spent together.
    Consolidation { coins: Vec<Coin>, total_sat: u64 },
    /// Even all coins together fall short of the target.
    InsufficientFunds { available_sat: u64, target_sat: u64 },
}

impl CoinSelection {
    /// Coins to be spent, in input order.
    pub fn inputs(&self) -> &[Coin] {
        match self {
            CoinSelection::SingleInput { coin } => std::slice::from_ref(coin),
            CoinSelection::Consolidation { coins, .. } => coins,
            CoinSelection::InsufficientFunds { .. } => &[],
        }
    }

    /// Value of the selected inputs; for `InsufficientFunds`, everything available.
    pub fn total_sat(&self) -> u64 {
        match self {
            CoinSelection::SingleInput { coin } => coin.amount_sat,
            CoinSelection::Consolidation { total_sat, .. } => *total_sat,
            CoinSelection::InsufficientFunds { available_sat, .. } => *available_sat,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, CoinSelection::InsufficientFunds { .. })
    }
}

/// Select coins to cover `target_sat`.
///
/// Largest-first: when the biggest coin covers the target it is spent alone,
/// otherwise every coin is consolidated into one spend. This is a deliberately
/// naive policy; it does not search for the fee-optimal subset.
///
/// Among coins of equal maximal value the first one encountered wins. An empty
/// coin set is always insufficient.
pub fn select_coins(coins: &[Coin], target_sat: u64) -> CoinSelection {
    let available_sat = total_sat(coins);

    let mut largest: Option<&Coin> = None;
    for coin in coins {
        if largest.map_or(true, |best| coin.amount_sat > best.amount_sat) {
            largest = Some(coin);
        }
    }

    let Some(largest) = largest else {
        return CoinSelection::InsufficientFunds {
            available_sat,
            target_sat,
        };
    };

    if largest.amount_sat >= target_sat {
        log::debug!(
            "selected single coin {}:{} ({} sat) for target {} sat",
            largest.txid,
            largest.vout,
            largest.amount_sat,
            target_sat
        );
        return CoinSelection::SingleInput {
            coin: largest.clone(),
        };
    }

    if available_sat < target_sat {
        return CoinSelection::InsufficientFunds {
            available_sat,
            target_sat,
        };
    }

    log::debug!(
        "consolidating {} coins ({} sat) for target {} sat",
        coins.len(),
        available_sat,
        target_sat
    );
    CoinSelection::Consolidation {
        coins: coins.to_vec(),
        total_sat: available_sat,
    }
}
