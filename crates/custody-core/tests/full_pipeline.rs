//! End-to-end transfer pipeline tests against in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bitcoin::address::NetworkUnchecked;
use bitcoin::consensus::encode::deserialize;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, PrivateKey, Transaction};
use chain_bch::fee::FeeRate;
use chain_bch::transaction::FeePolicy;
use chain_bch::utxo::{Coin, CoinSet};
use custody_core::collaborators::{BroadcastError, KeyStoreError, LookupError};
use custody_core::memory::{MemoryDirectory, SealedKeyStore};
use custody_core::{
    AddressDirectory, CoinSource, CustodyConfig, CustodyError, KeyStore, Network, TransferRequest,
    TransferService,
};
use key_vault::kdf::KdfParams;
use key_vault::seal_private_key;
use secrecy::SecretString;

const RECEIVER: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
const USER: &str = "alice";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sender_key() -> (String, String) {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&[0x42; 32]).unwrap();
    let key = PrivateKey::new(sk, bitcoin::Network::Bitcoin);
    let address = Address::p2pkh(key.public_key(&secp).pubkey_hash(), bitcoin::Network::Bitcoin);
    (key.to_wif(), address.to_string())
}

fn coins_at(address: &str, amounts: &[u64]) -> CoinSet {
    amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| Coin {
            txid: format!("{:02x}", i + 0x10).repeat(32),
            vout: i as u32,
            amount_sat: *amount,
            address: address.to_string(),
            confirmed: true,
        })
        .collect()
}

fn script_for(address: &str) -> bitcoin::ScriptBuf {
    address
        .parse::<Address<NetworkUnchecked>>()
        .unwrap()
        .assume_checked()
        .script_pubkey()
}

struct MockCoins {
    coins: CoinSet,
    calls: AtomicUsize,
}

impl CoinSource for MockCoins {
    async fn unspent_outputs(&self, _address: &str) -> Result<CoinSet, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.coins.clone())
    }
}

struct MockKeys {
    wif: String,
    calls: AtomicUsize,
}

impl KeyStore for MockKeys {
    async fn private_key(&self, _user_id: &str) -> Result<SecretString, KeyStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SecretString::from(self.wif.clone()))
    }
}

struct MockDirectory {
    address: String,
}

impl AddressDirectory for MockDirectory {
    async fn address_for_user(&self, user_id: &str) -> Result<String, LookupError> {
        if user_id == USER {
            Ok(self.address.clone())
        } else {
            Err(LookupError::NotFound(user_id.to_string()))
        }
    }
}

enum Outcome {
    Accept,
    Fail(BroadcastError),
}

struct MockNetwork {
    outcome: Outcome,
    calls: AtomicUsize,
    last_tx: Mutex<Option<Transaction>>,
}

impl Network for MockNetwork {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, BroadcastError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tx: Transaction = deserialize(raw_tx).expect("broadcast bytes decode");
        let txid = tx.compute_txid().to_string();
        *self.last_tx.lock().unwrap() = Some(tx);
        match &self.outcome {
            Outcome::Accept => Ok(txid),
            Outcome::Fail(err) => Err(err.clone()),
        }
    }
}

struct Harness {
    coins: Arc<MockCoins>,
    keys: Arc<MockKeys>,
    network: Arc<MockNetwork>,
    sender: String,
    service: TransferService<Arc<MockCoins>, Arc<MockKeys>, MockDirectory, Arc<MockNetwork>>,
}

impl Harness {
    fn new(config: CustodyConfig, amounts: &[u64], outcome: Outcome) -> Self {
        init_logging();
        let (wif, sender) = sender_key();
        let coins = Arc::new(MockCoins {
            coins: coins_at(&sender, amounts),
            calls: AtomicUsize::new(0),
        });
        let keys = Arc::new(MockKeys {
            wif,
            calls: AtomicUsize::new(0),
        });
        let network = Arc::new(MockNetwork {
            outcome,
            calls: AtomicUsize::new(0),
            last_tx: Mutex::new(None),
        });
        let directory = MockDirectory {
            address: sender.clone(),
        };
        let service = TransferService::new(
            config,
            Arc::clone(&coins),
            Arc::clone(&keys),
            directory,
            Arc::clone(&network),
        );
        Self {
            coins,
            keys,
            network,
            sender,
            service,
        }
    }

    fn counts(&self) -> (usize, usize, usize) {
        (
            self.coins.calls.load(Ordering::SeqCst),
            self.keys.calls.load(Ordering::SeqCst),
            self.network.calls.load(Ordering::SeqCst),
        )
    }
}

#[tokio::test]
async fn single_coin_send_deducts_fee_once() {
    let h = Harness::new(CustodyConfig::default(), &[500_000], Outcome::Accept);

    let result = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap();

    assert_eq!(result.fee_paid_sat, 226);
    assert_eq!(result.amount_transferred_sat, 99_774);
    assert_eq!(result.sender_id, USER);
    assert_eq!(result.receiving_address, RECEIVER);
    assert_eq!(h.counts(), (1, 1, 1));

    let tx = h.network.last_tx.lock().unwrap().clone().unwrap();
    assert_eq!(result.txid, tx.compute_txid().to_string());
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[0].value.to_sat(), 400_000);
    assert_eq!(tx.output[0].script_pubkey, script_for(&h.sender));
    assert_eq!(tx.output[1].value.to_sat(), 99_774);
    assert_eq!(tx.output[1].script_pubkey, script_for(RECEIVER));

    let paid_out: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
    assert_eq!(paid_out + result.fee_paid_sat, 500_000);
}

#[tokio::test]
async fn consolidation_spends_every_coin() {
    let h = Harness::new(
        CustodyConfig::default(),
        &[10_000, 20_000, 5_000],
        Outcome::Accept,
    );

    let result = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 30_000))
        .await
        .unwrap();

    assert_eq!(result.fee_paid_sat, 522);
    assert_eq!(result.amount_transferred_sat, 29_478);

    let tx = h.network.last_tx.lock().unwrap().clone().unwrap();
    assert_eq!(tx.input.len(), 3);
    assert_eq!(tx.output[0].value.to_sat(), 5_000);
}

#[tokio::test]
async fn consolidation_fee_exceeding_surplus_is_refused() {
    // 3 inputs / 2 outputs at 11 sat/byte costs 5742 sat, over the 5000 surplus.
    let config = CustodyConfig {
        fee_rate: FeeRate::from_sat_per_byte(11),
        ..Default::default()
    };
    let h = Harness::new(config, &[10_000, 20_000, 5_000], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 30_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "FeeExceedsFunds");
    assert_eq!(h.counts(), (1, 0, 0));

    let quote = h.service.quote_fee(USER, 30_000).await.unwrap_err();
    assert_eq!(quote.kind(), "FeeExceedsFunds");
}

#[tokio::test]
async fn add_on_top_consolidation_fee_exceeding_surplus_is_refused() {
    let config = CustodyConfig {
        fee_rate: FeeRate::from_sat_per_byte(11),
        fee_policy: FeePolicy::AddOnTop,
        ..Default::default()
    };
    let h = Harness::new(config, &[10_000, 20_000, 5_000], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 30_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "FeeExceedsFunds");
    assert_eq!(h.counts(), (1, 0, 0));
}

#[tokio::test]
async fn empty_coin_set_never_reaches_signer_or_network() {
    let h = Harness::new(CustodyConfig::default(), &[], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 1_000))
        .await
        .unwrap_err();

    assert!(matches!(err, CustodyError::InsufficientFunds(_)));
    assert_eq!(h.counts(), (1, 0, 0));
}

#[tokio::test]
async fn total_below_target_is_insufficient() {
    let h = Harness::new(CustodyConfig::default(), &[3_000, 4_000], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 10_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "InsufficientFunds");
    assert_eq!(h.counts(), (1, 0, 0));
}

#[tokio::test]
async fn rejected_broadcast_produces_no_result() {
    let h = Harness::new(
        CustodyConfig::default(),
        &[500_000],
        Outcome::Fail(BroadcastError::Rejected {
            reason: "txn-mempool-conflict".into(),
        }),
    );

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CustodyError::BroadcastRejected {
            reason: "txn-mempool-conflict".into()
        }
    );
    assert_eq!(h.counts(), (1, 1, 1));
}

#[tokio::test]
async fn ambiguous_broadcast_is_status_unknown() {
    let h = Harness::new(
        CustodyConfig::default(),
        &[500_000],
        Outcome::Fail(BroadcastError::StatusUnknown("timed out".into())),
    );

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "BroadcastStatusUnknown");
}

#[tokio::test]
async fn invalid_requests_touch_nothing() {
    let h = Harness::new(CustodyConfig::default(), &[500_000], Outcome::Accept);

    for request in [
        TransferRequest::new(USER, RECEIVER, 0),
        TransferRequest::new(USER, "not-an-address", 1_000),
        TransferRequest::new(USER, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", 1_000),
        TransferRequest::new(USER, "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn", 1_000),
    ] {
        let err = h.service.send(&request).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest", "{request:?}");
    }
    assert_eq!(h.counts(), (0, 0, 0));
}

#[tokio::test]
async fn unknown_sender_is_lookup_error() {
    let h = Harness::new(CustodyConfig::default(), &[500_000], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new("mallory", RECEIVER, 1_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "LookupError");
    assert_eq!(h.counts(), (0, 0, 0));
}

#[tokio::test]
async fn quote_matches_send_and_is_repeatable() {
    let h = Harness::new(CustodyConfig::default(), &[500_000], Outcome::Accept);

    let first = h.service.quote_fee(USER, 100_000).await.unwrap();
    let second = h.service.quote_fee(USER, 100_000).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.estimated_fee_sat, 226);
    assert_eq!((first.input_count, first.output_count), (1, 2));
    assert_eq!(h.counts(), (2, 0, 0));

    let sent = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap();
    assert_eq!(sent.fee_paid_sat, first.estimated_fee_sat);
}

#[tokio::test]
async fn quote_reports_forfeited_dust() {
    let config = CustodyConfig {
        fee_rate: FeeRate::from_sat_per_kb(500),
        ..Default::default()
    };
    let h = Harness::new(config, &[100_100], Outcome::Accept);

    let quote = h.service.quote_fee(USER, 100_000).await.unwrap();
    assert_eq!(quote.output_count, 1);
    assert_eq!(quote.estimated_fee_sat, 96 + 100);
}

#[tokio::test]
async fn remainder_below_fee_is_refused() {
    let h = Harness::new(CustodyConfig::default(), &[100_050], Outcome::Accept);

    let err = h
        .service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "FeeExceedsFunds");
    assert_eq!(h.counts(), (1, 0, 0));
}

#[tokio::test]
async fn balance_sums_coins() {
    let h = Harness::new(CustodyConfig::default(), &[1_000, 2_500], Outcome::Accept);

    let balance = h.service.balance(USER).await.unwrap();
    assert_eq!(balance.address, h.sender);
    assert_eq!(balance.balance_sat, 3_500);
    assert_eq!(balance.unconfirmed_sat, 0);
    assert_eq!(balance.coin_count, 2);
    assert_eq!(h.service.address(USER).await.unwrap(), h.sender);
}

#[tokio::test]
async fn balance_separates_unconfirmed_coins() {
    init_logging();
    let (wif, sender) = sender_key();
    let mut coins = coins_at(&sender, &[1_000, 2_500, 400]);
    coins[1].confirmed = false;

    let service = TransferService::new(
        CustodyConfig::default(),
        MockCoins {
            coins,
            calls: AtomicUsize::new(0),
        },
        MockKeys {
            wif,
            calls: AtomicUsize::new(0),
        },
        MockDirectory { address: sender },
        MockNetwork {
            outcome: Outcome::Accept,
            calls: AtomicUsize::new(0),
            last_tx: Mutex::new(None),
        },
    );

    let balance = service.balance(USER).await.unwrap();
    assert_eq!(balance.balance_sat, 1_400);
    assert_eq!(balance.unconfirmed_sat, 2_500);
    assert_eq!(balance.coin_count, 3);
}

#[tokio::test]
async fn key_for_another_address_fails_before_broadcast() {
    init_logging();
    let (_, sender) = sender_key();
    let other = PrivateKey::new(
        SecretKey::from_slice(&[0x07; 32]).unwrap(),
        bitcoin::Network::Bitcoin,
    );
    let coins = Arc::new(MockCoins {
        coins: coins_at(&sender, &[500_000]),
        calls: AtomicUsize::new(0),
    });
    let keys = Arc::new(MockKeys {
        wif: other.to_wif(),
        calls: AtomicUsize::new(0),
    });
    let network = Arc::new(MockNetwork {
        outcome: Outcome::Accept,
        calls: AtomicUsize::new(0),
        last_tx: Mutex::new(None),
    });
    let service = TransferService::new(
        CustodyConfig::default(),
        coins,
        Arc::clone(&keys),
        MockDirectory { address: sender },
        Arc::clone(&network),
    );

    let err = service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SigningError");
    assert_eq!(keys.calls.load(Ordering::SeqCst), 1);
    assert_eq!(network.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sealed_key_store_signs_end_to_end() {
    init_logging();
    let (wif, sender) = sender_key();

    let mut keys = SealedKeyStore::new(SecretString::from("service-password".to_string()));
    keys.insert(
        USER,
        seal_private_key(USER, &wif, b"service-password", KdfParams::insecure_fast()).unwrap(),
    );
    let mut directory = MemoryDirectory::new();
    directory.insert(USER, sender.clone());

    let coins = MockCoins {
        coins: coins_at(&sender, &[500_000]),
        calls: AtomicUsize::new(0),
    };
    let network = Arc::new(MockNetwork {
        outcome: Outcome::Accept,
        calls: AtomicUsize::new(0),
        last_tx: Mutex::new(None),
    });
    let service = TransferService::new(
        CustodyConfig::default(),
        coins,
        keys,
        directory,
        Arc::clone(&network),
    );

    let result = service
        .send(&TransferRequest::new(USER, RECEIVER, 100_000))
        .await
        .unwrap();
    assert_eq!(result.amount_transferred_sat, 99_774);
    assert_eq!(network.calls.load(Ordering::SeqCst), 1);
}
