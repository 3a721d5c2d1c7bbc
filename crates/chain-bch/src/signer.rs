use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::script::{Builder, PushBytesBuf, ScriptBuf};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, PrivateKey, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::address::parse_address;
use crate::error::BchError;
use crate::network::BchNetwork;
use crate::transaction::TransactionPlan;

/// Sign all inputs and all outputs.
pub const SIGHASH_ALL: u32 = 0x01;

/// Replay-protection flag required on every Bitcoin Cash signature.
pub const SIGHASH_FORKID: u32 = 0x40;

/// The only sighash type this signer produces.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txid: String,
    pub raw: Vec<u8>,
}

impl SignedTransaction {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Build the unsigned transaction for `plan`.
///
/// Returns the transaction (empty scriptSigs) together with the locking
/// script of every spent coin, in input order.
pub fn build_unsigned(
    plan: &TransactionPlan,
    network: BchNetwork,
) -> Result<(Transaction, Vec<ScriptBuf>), BchError> {
    if plan.inputs.is_empty() {
        return Err(BchError::TransactionBuildError(
            "plan has no inputs".into(),
        ));
    }

    let mut inputs = Vec::with_capacity(plan.inputs.len());
    let mut prevout_scripts = Vec::with_capacity(plan.inputs.len());

    for coin in &plan.inputs {
        let txid: Txid = coin
            .txid
            .parse()
            .map_err(|e| BchError::TransactionBuildError(format!("invalid txid {}: {e}", coin.txid)))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, coin.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        });
        prevout_scripts.push(parse_address(&coin.address, network)?.script_pubkey());
    }

    let outputs = plan
        .outputs
        .iter()
        .map(|out| {
            Ok(TxOut {
                value: Amount::from_sat(out.amount_sat),
                script_pubkey: parse_address(&out.address, network)?.script_pubkey(),
            })
        })
        .collect::<Result<Vec<_>, BchError>>()?;

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    Ok((tx, prevout_scripts))
}

/// BIP-143 style signature hash with the FORKID flag.
///
/// Commits to the value of the output being spent, so every input is hashed
/// with its own amount.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &ScriptBuf,
    value_sat: u64,
    sighash_type: u32,
) -> Result<[u8; 32], BchError> {
    let input = tx.input.get(input_index).ok_or_else(|| {
        BchError::SigningError(format!(
            "input index {input_index} out of range (tx has {} inputs)",
            tx.input.len()
        ))
    })?;

    let mut prevouts = Vec::with_capacity(tx.input.len() * 36);
    let mut sequences = Vec::with_capacity(tx.input.len() * 4);
    for txin in &tx.input {
        prevouts.extend_from_slice(&serialize(&txin.previous_output));
        sequences.extend_from_slice(&txin.sequence.0.to_le_bytes());
    }

    let mut outputs = Vec::new();
    for txout in &tx.output {
        outputs.extend_from_slice(&serialize(txout));
    }

    let mut preimage = Vec::with_capacity(256);
    preimage.extend_from_slice(&tx.version.0.to_le_bytes());
    preimage.extend_from_slice(&sha256d::Hash::hash(&prevouts).to_byte_array());
    preimage.extend_from_slice(&sha256d::Hash::hash(&sequences).to_byte_array());
    preimage.extend_from_slice(&serialize(&input.previous_output));
    preimage.extend_from_slice(&serialize(script_code));
    preimage.extend_from_slice(&value_sat.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.0.to_le_bytes());
    preimage.extend_from_slice(&sha256d::Hash::hash(&outputs).to_byte_array());
    preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&sighash_type.to_le_bytes());

    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

/// Sign every input of `plan` with the WIF-encoded key.
///
/// All inputs must be locked to the key's P2PKH script. Either every input
/// is signed or an error is returned; no partially signed transaction
/// escapes.
pub fn sign_plan(
    plan: &TransactionPlan,
    wif: &str,
    network: BchNetwork,
) -> Result<SignedTransaction, BchError> {
    let secp = Secp256k1::new();
    let private_key = PrivateKey::from_wif(wif.trim())
        .map_err(|e| BchError::InvalidPrivateKey(format!("invalid WIF: {e}")))?;
    // A 65-byte key push makes each input ~180 bytes, past what the fee paid for.
    if !private_key.compressed {
        return Err(BchError::InvalidPrivateKey(
            "uncompressed keys are not supported".into(),
        ));
    }
    let public_key = private_key.public_key(&secp);
    let key_script = ScriptBuf::new_p2pkh(&public_key.pubkey_hash());

    let (unsigned, prevout_scripts) = build_unsigned(plan, network)?;
    let mut signed = unsigned.clone();

    for (index, coin) in plan.inputs.iter().enumerate() {
        if prevout_scripts[index] != key_script {
            return Err(BchError::SigningError(format!(
                "key does not control input {index} ({}:{})",
                coin.txid, coin.vout
            )));
        }

        let sighash =
            signature_hash(&unsigned, index, &key_script, coin.amount_sat, SIGHASH_ALL_FORKID)?;
        let msg = Message::from_digest(sighash);
        // Low-R keeps the DER encoding within the 148-byte input estimate.
        let signature = secp.sign_ecdsa_low_r(&msg, &private_key.inner);

        // DER signature followed by the sighash type byte.
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(SIGHASH_ALL_FORKID as u8);
        let sig_push = PushBytesBuf::try_from(sig_bytes)
            .map_err(|e| BchError::SigningError(format!("signature push failed: {e}")))?;

        signed.input[index].script_sig = Builder::new()
            .push_slice(sig_push)
            .push_key(&public_key)
            .into_script();
    }

    log::debug!(
        "signed {} inputs, {} outputs",
        signed.input.len(),
        signed.output.len()
    );

    Ok(SignedTransaction {
        txid: signed.compute_txid().to_string(),
        raw: serialize(&signed),
    })
}
