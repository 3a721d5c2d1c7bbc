//! In-process collaborators backed by maps.

use std::collections::HashMap;
use std::sync::Arc;

use key_vault::{open_private_key, SealedKey, VaultError};
use secrecy::{ExposeSecret, SecretString};

use crate::collaborators::{AddressDirectory, KeyStore, KeyStoreError, LookupError};

/// User id to custodial address.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    addresses: HashMap<String, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user_id: impl Into<String>, address: impl Into<String>) {
        self.addresses.insert(user_id.into(), address.into());
    }
}

impl AddressDirectory for MemoryDirectory {
    async fn address_for_user(&self, user_id: &str) -> Result<String, LookupError> {
        self.addresses
            .get(user_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(format!("address for user {user_id}")))
    }
}

/// Keys sealed under one service password, opened on demand.
///
/// Decryption runs Argon2id, so it is moved off the async executor.
#[derive(Clone)]
pub struct SealedKeyStore {
    keys: HashMap<String, SealedKey>,
    password: Arc<SecretString>,
}

impl SealedKeyStore {
    pub fn new(password: SecretString) -> Self {
        Self {
            keys: HashMap::new(),
            password: Arc::new(password),
        }
    }

    pub fn insert(&mut self, user_id: impl Into<String>, sealed: SealedKey) {
        self.keys.insert(user_id.into(), sealed);
    }
}

impl KeyStore for SealedKeyStore {
    async fn private_key(&self, user_id: &str) -> Result<SecretString, KeyStoreError> {
        let sealed = self
            .keys
            .get(user_id)
            .cloned()
            .ok_or_else(|| KeyStoreError::NotFound(user_id.to_string()))?;
        let password = Arc::clone(&self.password);
        let owner = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            open_private_key(&sealed, &owner, password.expose_secret().as_bytes())
        })
        .await
        .map_err(|e| KeyStoreError::Decryption(format!("key task failed: {e}")))?
        .map_err(|e| match e {
            VaultError::DecryptionFailed(_) => {
                KeyStoreError::Decryption(format!("cannot open key for {user_id}"))
            }
            other => KeyStoreError::Decryption(other.to_string()),
        })
    }
}
