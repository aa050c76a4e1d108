//! Key derivation: Argon2id passphrase → symmetric grant key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};

use hoard_core::{HoardError, HoardResult};

use crate::keys::SymmetricKey;
use crate::KEY_SIZE;

/// Argon2id parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 256-bit key from a passphrase and salt using Argon2id.
///
/// Secrets are looked up by public id and must resolve to the same key on
/// every machine, so the salt is derived from the public id rather than
/// generated randomly (see `hoard_secrets`).
pub fn derive_secret_key(
    passphrase: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> HoardResult<SymmetricKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| HoardError::Config(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| HoardError::InvalidKey(format!("Argon2id KDF failed: {e}")))?;

    Ok(SymmetricKey::from_bytes(key))
}
