//! Ed25519 grant signing
//!
//! Asymmetric grants are signed by the sealing node and only opened when the
//! signature comes from a trusted key. The local key is always trusted.

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::RngCore;

use hoard_core::encoding::{from_base64, to_base64};
use hoard_core::{HoardError, HoardResult};

/// Size of an Ed25519 seed in bytes
pub const SIGNING_KEY_SIZE: usize = 32;

pub struct Signer {
    key: SigningKey,
    trusted: Vec<VerifyingKey>,
}

impl Signer {
    pub fn from_seed(seed: &[u8]) -> HoardResult<Self> {
        let seed: [u8; SIGNING_KEY_SIZE] = seed.try_into().map_err(|_| {
            HoardError::InvalidKey(format!(
                "signing key must be {SIGNING_KEY_SIZE} bytes, got {}",
                seed.len()
            ))
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
            trusted: Vec::new(),
        })
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; SIGNING_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            key: SigningKey::from_bytes(&seed),
            trusted: Vec::new(),
        }
    }

    /// Build from a base64 seed and a list of base64 trusted public keys.
    pub fn parse(seed: &str, trusted: &[String]) -> HoardResult<Self> {
        let bytes = from_base64(seed)
            .map_err(|_| HoardError::InvalidKey("signing key is not base64".into()))?;
        let mut signer = Self::from_seed(&bytes)?;
        for key in trusted {
            signer = signer.trust(parse_public_key(key)?);
        }
        Ok(signer)
    }

    pub fn trust(mut self, key: VerifyingKey) -> Self {
        if key != self.public_key() && !self.trusted.contains(&key) {
            self.trusted.push(key);
        }
        self
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn public_key_base64(&self) -> String {
        to_base64(self.public_key().as_bytes())
    }

    pub fn seed_base64(&self) -> String {
        to_base64(&self.key.to_bytes())
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.key.sign(msg)
    }

    /// Check `signature` over `msg` from `signer`. Unknown signers and bad
    /// signatures both fail authentication.
    pub fn verify(&self, msg: &[u8], signer: &VerifyingKey, signature: &Signature) -> HoardResult<()> {
        let known = *signer == self.public_key() || self.trusted.contains(signer);
        if !known {
            tracing::debug!(signer = %to_base64(signer.as_bytes()), "grant signed by untrusted key");
            return Err(HoardError::AuthenticationFailure);
        }
        signer
            .verify_strict(msg, signature)
            .map_err(|_| HoardError::AuthenticationFailure)
    }
}

pub fn parse_public_key(encoded: &str) -> HoardResult<VerifyingKey> {
    let bytes = from_base64(encoded)
        .map_err(|_| HoardError::InvalidKey("signer public key is not base64".into()))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| HoardError::InvalidKey(format!("signer public key has {} bytes", bytes.len())))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| HoardError::InvalidKey(format!("signer public key: {e}")))
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key_base64())
            .field("trusted", &self.trusted.len())
            .finish()
    }
}
