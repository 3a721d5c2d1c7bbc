use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters, stored alongside each sealed key so that
/// keys sealed under older parameters can still be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Cheap parameters for regtest fixtures and tests. Not for production keys.
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 32-byte sealing key from `password` and `salt` with Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> Result<[u8; 32], VaultError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| VaultError::KdfFailed(format!("invalid argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| VaultError::KdfFailed(format!("argon2 hash failed: {e}")))?;

    Ok(output)
}

/// A fresh random salt from the OS RNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [0xABu8; SALT_LEN];
        let params = KdfParams::insecure_fast();
        let a = derive_key(b"vault-password", &salt, params).unwrap();
        let b = derive_key(b"vault-password", &salt, params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn passwords_and_salts_separate_keys() {
        let params = KdfParams::insecure_fast();
        let salt = [0x01u8; SALT_LEN];
        let a = derive_key(b"password-a", &salt, params).unwrap();
        let b = derive_key(b"password-b", &salt, params).unwrap();
        let c = derive_key(b"password-a", &[0x02u8; SALT_LEN], params).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_params_derive() {
        let key = derive_key(b"password123", &generate_salt(), KdfParams::default()).unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn zero_memory_is_rejected() {
        let params = KdfParams {
            memory_kib: 0,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LEN], params),
            Err(VaultError::KdfFailed(_))
        ));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
