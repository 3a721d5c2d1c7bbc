use aes_gcm::aead::{Aead, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::VaultError;
use crate::kdf::{self, KdfParams, SALT_LEN};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A WIF private key encrypted under a password-derived key.
///
/// The owner id, KDF parameters and salt are authenticated together with
/// the ciphertext, so a record moved to another owner or edited in place
/// no longer opens. Binary fields are hex encoded so the record can live in
/// any string-valued key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub kdf: KdfParams,
    /// Argon2id salt, hex.
    pub salt: String,
    /// `nonce | ciphertext | tag`, hex.
    pub ciphertext: String,
}

impl SealedKey {
    pub fn to_json(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Seal the WIF-encoded private key of `owner` with `password`.
pub fn seal_private_key(
    owner: &str,
    wif: &str,
    password: &[u8],
    params: KdfParams,
) -> Result<SealedKey, VaultError> {
    let wif = wif.trim();
    if wif.is_empty() {
        return Err(VaultError::InvalidInput("empty private key".into()));
    }

    let salt = kdf::generate_salt();
    let aad = associated_data(owner, params, &salt);
    let mut key = kdf::derive_key(password, &salt, params)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let encrypted = cipher.encrypt(
        &nonce,
        Payload {
            msg: wif.as_bytes(),
            aad: &aad,
        },
    );
    key.zeroize();
    let encrypted = encrypted.map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + encrypted.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&encrypted);

    Ok(SealedKey {
        kdf: params,
        salt: hex::encode(salt),
        ciphertext: hex::encode(blob),
    })
}

/// Recover `owner`'s WIF private key from a [`SealedKey`].
///
/// A wrong password, a different owner or a modified record all surface as
/// [`VaultError::DecryptionFailed`].
pub fn open_private_key(
    sealed: &SealedKey,
    owner: &str,
    password: &[u8],
) -> Result<SecretString, VaultError> {
    let salt: [u8; SALT_LEN] = hex::decode(&sealed.salt)
        .map_err(|e| VaultError::InvalidInput(format!("salt is not hex: {e}")))?
        .try_into()
        .map_err(|_| VaultError::InvalidInput("invalid salt length".into()))?;
    let blob = hex::decode(&sealed.ciphertext)
        .map_err(|e| VaultError::InvalidInput(format!("ciphertext is not hex: {e}")))?;
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::InvalidInput(format!(
            "ciphertext too short: {} bytes",
            blob.len()
        )));
    }
    let (nonce, encrypted) = blob.split_at(NONCE_LEN);
    let aad = associated_data(owner, sealed.kdf, &salt);

    let mut key = kdf::derive_key(password, &salt, sealed.kdf)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: encrypted,
                aad: &aad,
            },
        )
        .map(Zeroizing::new);
    key.zeroize();
    let plaintext = plaintext.map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let wif = std::str::from_utf8(&plaintext)
        .map_err(|_| VaultError::DecryptionFailed("sealed key is not valid UTF-8".into()))?;
    Ok(SecretString::from(wif.to_owned()))
}

/// `"key-vault/1" | len(owner) | owner | memory | iterations | lanes | salt`,
/// integers little-endian.
fn associated_data(owner: &str, params: KdfParams, salt: &[u8; SALT_LEN]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(11 + 4 + owner.len() + 12 + SALT_LEN);
    aad.extend_from_slice(b"key-vault/1");
    aad.extend_from_slice(&(owner.len() as u32).to_le_bytes());
    aad.extend_from_slice(owner.as_bytes());
    aad.extend_from_slice(&params.memory_kib.to_le_bytes());
    aad.extend_from_slice(&params.iterations.to_le_bytes());
    aad.extend_from_slice(&params.parallelism.to_le_bytes());
    aad.extend_from_slice(salt);
    aad
}
