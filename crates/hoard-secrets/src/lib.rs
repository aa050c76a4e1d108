//! hoard-secrets: the capability object handed to grant sealing
//!
//! A [`SecretsManager`] bundles
//!   - a symmetric provider: public id → 256-bit key
//!   - an optional age [`Keyring`] for asymmetric grants
//!   - an optional Ed25519 [`Signer`] that signs and vets asymmetric grants
//!
//! Symmetric keys come from hoard.toml (`[[secrets.symmetric]]`), as a base64
//! key, an Argon2id-stretched passphrase, or a base64 key in a named
//! environment variable.

pub mod identity;
pub mod keyring;
pub mod signing;

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;

use hoard_core::config::{SecretsConfig, SymmetricSecretConfig};
use hoard_core::encoding::from_base64;
use hoard_core::{HoardError, HoardResult};
use hoard_crypto::{derive_secret_key, secure_hash, KdfParams, SymmetricKey};

pub use identity::{find_age_identity, IdentitySource};
pub use keyring::Keyring;
pub use signing::Signer;

pub type SymmetricProvider = Arc<dyn Fn(&str) -> HoardResult<SymmetricKey> + Send + Sync>;

#[derive(Clone)]
pub struct SecretsManager {
    provider: SymmetricProvider,
    keyring: Option<Arc<Keyring>>,
    signer: Option<Arc<Signer>>,
}

impl SecretsManager {
    pub fn new(provider: SymmetricProvider, keyring: Option<Keyring>) -> Self {
        Self {
            provider,
            keyring: keyring.map(Arc::new),
            signer: None,
        }
    }

    /// No symmetric secrets and no keyring.
    pub fn noop() -> Self {
        Self::new(
            Arc::new(|_| Err(HoardError::SecretNotFound("no secrets provided to hoard".into()))),
            None,
        )
    }

    pub fn from_keys(keys: HashMap<String, SymmetricKey>) -> Self {
        Self::new(map_provider(keys), None)
    }

    pub fn with_keyring(mut self, keyring: Keyring) -> Self {
        self.keyring = Some(Arc::new(keyring));
        self
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    pub fn symmetric(&self, public_id: &str) -> HoardResult<SymmetricKey> {
        (self.provider)(public_id)
    }

    pub fn keyring(&self) -> Option<&Keyring> {
        self.keyring.as_deref()
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_deref()
    }

    /// Build a manager from configuration, discovering the age identity
    /// through the usual chain.
    pub async fn load(config: &SecretsConfig) -> anyhow::Result<Self> {
        let keys = symmetric_keys(config)?;
        let mut manager = Self::from_keys(keys);

        if let Some(found) = find_age_identity(config).await? {
            let keyring = Keyring::parse(&found.key_data)?;
            tracing::info!(source = %found.source, recipient = %keyring.recipient(), "loaded age keyring");
            manager = manager.with_keyring(keyring);
        }

        if let Some(seed) = &config.signing_key {
            let signer = Signer::parse(seed, &config.trusted_signers)?;
            tracing::info!(public_key = %signer.public_key_base64(), trusted = config.trusted_signers.len(), "loaded grant signing key");
            manager = manager.with_signer(signer);
        } else if !config.trusted_signers.is_empty() {
            anyhow::bail!("trusted_signers requires a signing_key");
        }
        Ok(manager)
    }
}

impl std::fmt::Debug for SecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManager")
            .field("keyring", &self.keyring)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

fn map_provider(keys: HashMap<String, SymmetricKey>) -> SymmetricProvider {
    Arc::new(move |public_id: &str| {
        if public_id.is_empty() {
            return Err(HoardError::InvalidSpec("empty secret id".into()));
        }
        keys.get(public_id).cloned().ok_or_else(|| {
            HoardError::SecretNotFound(format!("no symmetric secret with id '{public_id}'"))
        })
    })
}

/// Resolve every configured symmetric secret to a key.
pub fn symmetric_keys(config: &SecretsConfig) -> HoardResult<HashMap<String, SymmetricKey>> {
    let params = KdfParams {
        mem_cost_kib: config
            .argon2_mem_cost_kib
            .unwrap_or(KdfParams::default().mem_cost_kib),
        ..Default::default()
    };

    config
        .symmetric
        .iter()
        .map(|secret| Ok((secret.public_id.clone(), resolve_secret(secret, &params)?)))
        .collect()
}

fn resolve_secret(secret: &SymmetricSecretConfig, params: &KdfParams) -> HoardResult<SymmetricKey> {
    if secret.public_id.is_empty() {
        return Err(HoardError::Config("symmetric secret without public_id".into()));
    }
    let invalid = |what: &str| {
        HoardError::Config(format!("secret '{}': {what}", secret.public_id))
    };

    if let Some(var) = &secret.from_env {
        let value = std::env::var(var).map_err(|_| invalid(&format!("${var} is not set")))?;
        let bytes = from_base64(&value).map_err(|_| invalid(&format!("${var} is not base64")))?;
        return SymmetricKey::from_slice(&bytes);
    }
    if let Some(encoded) = &secret.secret_key {
        let bytes = from_base64(encoded).map_err(|_| invalid("secret_key is not base64"))?;
        return SymmetricKey::from_slice(&bytes);
    }
    if let Some(passphrase) = &secret.passphrase {
        return derive_secret_key(
            &SecretString::from(passphrase.clone()),
            &passphrase_salt(&secret.public_id),
            params,
        );
    }
    Err(invalid("one of secret_key, passphrase, or from_env is required"))
}

/// Every node must derive the same key for a public id, so the salt is a
/// hash of the id itself.
fn passphrase_salt(public_id: &str) -> [u8; 16] {
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&secure_hash(public_id.as_bytes())[..16]);
    salt
}
