//! age X25519 keyring used to open asymmetric grants

use std::io::Read;

use age::x25519;

use hoard_core::{HoardError, HoardResult};

pub struct Keyring {
    identities: Vec<x25519::Identity>,
}

impl Keyring {
    /// Parse an age identity file: one `AGE-SECRET-KEY-1...` per line,
    /// `#` comments and blank lines ignored.
    pub fn parse(key_data: &str) -> HoardResult<Self> {
        let identities = key_data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                line.parse::<x25519::Identity>()
                    .map_err(|e| HoardError::InvalidKey(format!("parsing age identity: {e}")))
            })
            .collect::<HoardResult<Vec<_>>>()?;

        if identities.is_empty() {
            return Err(HoardError::InvalidKey("age identity file contains no keys".into()));
        }
        Ok(Self { identities })
    }

    pub fn generate() -> Self {
        Self {
            identities: vec![x25519::Identity::generate()],
        }
    }

    /// Recipient for the primary (first) identity; grants sealed without an
    /// explicit public key are addressed to it.
    pub fn recipient(&self) -> x25519::Recipient {
        self.identities[0].to_public()
    }

    /// Open an age ciphertext. A keyring that cannot open it and a
    /// corrupted ciphertext fail the same way.
    pub fn decrypt(&self, ciphertext: &[u8]) -> HoardResult<Vec<u8>> {
        let decryptor = age::Decryptor::new(ciphertext).map_err(|e| {
            tracing::debug!(error = %e, "unreadable age header");
            HoardError::AuthenticationFailure
        })?;

        let mut reader = decryptor
            .decrypt(self.identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| {
                tracing::debug!(error = %e, "age decryption failed");
                HoardError::AuthenticationFailure
            })?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|_| HoardError::AuthenticationFailure)?;
        Ok(plaintext)
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("recipient", &self.recipient().to_string())
            .field("identities", &self.identities.len())
            .finish()
    }
}
