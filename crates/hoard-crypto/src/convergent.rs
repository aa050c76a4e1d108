//! Convergent (content-keyed) encryption
//!
//! The key for a plaintext is the BLAKE3 hash of the salted plaintext, so
//! encryption must not depend on a nonce. AES-SIV is a deterministic AEAD
//! (RFC 5297) that stays secure with a fixed nonce, which makes it a sound
//! fit for a one-time key.
//!
//! Salted plaintext layout: `salt || data`. When a salt is present the AAD is
//! the JSON descriptor `{"SaltType":"prefix","SaltLength":n}`, so a ciphertext
//! produced with one salt never authenticates under another (or none).

use aes_siv::{
    aead::{Aead, KeyInit, Payload},
    Aes256SivAead, Nonce,
};
use hkdf::Hkdf;
use serde::Serialize;
use sha2::Sha256;
use zeroize::Zeroize;

use hoard_core::{HoardError, HoardResult};

use crate::{KEY_SIZE, TAG_SIZE};

const SIV_KEY_INFO: &[u8] = b"hoard-convergent-aes-siv";

/// Output of [`encrypt_convergent`].
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub secret_key: Vec<u8>,
    pub encrypted_data: Vec<u8>,
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("secret_key", &"[REDACTED]")
            .field("encrypted_len", &self.encrypted_data.len())
            .finish()
    }
}

#[derive(Serialize)]
struct SaltDescriptor {
    #[serde(rename = "SaltType")]
    salt_type: &'static str,
    #[serde(rename = "SaltLength")]
    salt_length: usize,
}

/// The hash used for both secret keys and storage addresses.
pub fn secure_hash(data: &[u8]) -> [u8; KEY_SIZE] {
    *blake3::hash(data).as_bytes()
}

/// Encrypt `data` under a key derived from its own (salted) content.
///
/// Returns a ciphertext of `salt.len() + data.len() + 16` bytes.
pub fn encrypt_convergent(data: &[u8], salt: &[u8]) -> HoardResult<EncryptedBlob> {
    let salted = salinate(data, salt);
    let secret_key = secure_hash(&salted);
    let aad = additional_data(salt)?;

    let cipher = siv_cipher(&secret_key)?;
    let encrypted_data = cipher
        .encrypt(
            &Nonce::default(),
            Payload {
                msg: &salted,
                aad: &aad,
            },
        )
        .map_err(|_| HoardError::Other(anyhow::anyhow!("convergent encryption failed")))?;

    Ok(EncryptedBlob {
        secret_key: secret_key.to_vec(),
        encrypted_data,
    })
}

/// Decrypt a ciphertext produced by [`encrypt_convergent`].
///
/// Any mismatch in key, salt, or ciphertext is an `AuthenticationFailure`.
pub fn decrypt_convergent(encrypted: &[u8], salt: &[u8], secret_key: &[u8]) -> HoardResult<Vec<u8>> {
    let key: &[u8; KEY_SIZE] = secret_key
        .try_into()
        .map_err(|_| HoardError::InvalidKey(format!("secret key must be {KEY_SIZE} bytes")))?;
    if encrypted.len() < TAG_SIZE + salt.len() {
        return Err(HoardError::AuthenticationFailure);
    }

    let aad = additional_data(salt)?;
    let cipher = siv_cipher(key)?;
    let salted = cipher
        .decrypt(
            &Nonce::default(),
            Payload {
                msg: encrypted,
                aad: &aad,
            },
        )
        .map_err(|_| HoardError::AuthenticationFailure)?;

    Ok(desalinate(salted, salt.len()))
}

fn siv_cipher(secret_key: &[u8; KEY_SIZE]) -> HoardResult<Aes256SivAead> {
    // AES-256-SIV takes two 32-byte sub-keys
    let mut double_key = [0u8; 64];
    Hkdf::<Sha256>::new(None, secret_key)
        .expand(SIV_KEY_INFO, &mut double_key)
        .map_err(|e| HoardError::Other(anyhow::anyhow!("HKDF expand for AES-SIV: {e}")))?;
    let cipher = Aes256SivAead::new((&double_key).into());
    double_key.zeroize();
    Ok(cipher)
}

fn salinate(data: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut salted = Vec::with_capacity(salt.len() + data.len());
    salted.extend_from_slice(salt);
    salted.extend_from_slice(data);
    salted
}

fn desalinate(mut salted: Vec<u8>, salt_len: usize) -> Vec<u8> {
    salted.drain(..salt_len);
    salted
}

fn additional_data(salt: &[u8]) -> HoardResult<Vec<u8>> {
    if salt.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec(&SaltDescriptor {
        salt_type: "prefix",
        salt_length: salt.len(),
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        let plain = decrypt_convergent(&blob.encrypted_data, b"", &blob.secret_key).unwrap();
        assert_eq!(plain, b"hot buns");
    }

    #[test]
    fn test_ciphertext_length() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        assert_eq!(blob.encrypted_data.len(), 8 + TAG_SIZE);

        let salt = [7u8; 32];
        let salted = encrypt_convergent(b"hot buns", &salt).unwrap();
        assert_eq!(salted.encrypted_data.len(), 8 + TAG_SIZE + 32);
    }

    #[test]
    fn test_salt_changes_key_and_ciphertext() {
        let plain = encrypt_convergent(b"hot buns", b"").unwrap();
        let salted = encrypt_convergent(b"hot buns", b"pepper").unwrap();
        assert_ne!(plain.secret_key, salted.secret_key);
        assert_ne!(plain.encrypted_data, salted.encrypted_data);
    }

    #[test]
    fn test_salt_mismatch_fails_authentication() {
        let blob = encrypt_convergent(b"hot buns", b"pepper").unwrap();

        for wrong in [&b""[..], &b"paprika"[..], &b"peppe"[..]] {
            let result = decrypt_convergent(&blob.encrypted_data, wrong, &blob.secret_key);
            assert!(
                matches!(result, Err(HoardError::AuthenticationFailure)),
                "salt {wrong:?} must not authenticate"
            );
        }
    }

    #[test]
    fn test_unsalted_ciphertext_rejects_any_salt() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        let result = decrypt_convergent(&blob.encrypted_data, b"pepper", &blob.secret_key);
        assert!(matches!(result, Err(HoardError::AuthenticationFailure)));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        let result = decrypt_convergent(&blob.encrypted_data, b"", &[0u8; KEY_SIZE]);
        assert!(matches!(result, Err(HoardError::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        let mut tampered = blob.encrypted_data.clone();
        tampered[0] ^= 0x01;
        let result = decrypt_convergent(&tampered, b"", &blob.secret_key);
        assert!(matches!(result, Err(HoardError::AuthenticationFailure)));
    }

    #[test]
    fn test_short_key_rejected() {
        let blob = encrypt_convergent(b"hot buns", b"").unwrap();
        let result = decrypt_convergent(&blob.encrypted_data, b"", &[1u8; 7]);
        assert!(matches!(result, Err(HoardError::InvalidKey(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let blob = encrypt_convergent(b"", b"").unwrap();
        assert_eq!(blob.encrypted_data.len(), TAG_SIZE);
        let plain = decrypt_convergent(&blob.encrypted_data, b"", &blob.secret_key).unwrap();
        assert!(plain.is_empty());
    }

    proptest! {
        #[test]
        fn prop_deterministic(data in proptest::collection::vec(any::<u8>(), 0..2048),
                              salt in proptest::collection::vec(any::<u8>(), 0..64)) {
            let a = encrypt_convergent(&data, &salt).unwrap();
            let b = encrypt_convergent(&data, &salt).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048),
                          salt in proptest::collection::vec(any::<u8>(), 0..64)) {
            let blob = encrypt_convergent(&data, &salt).unwrap();
            let plain = decrypt_convergent(&blob.encrypted_data, &salt, &blob.secret_key).unwrap();
            prop_assert_eq!(plain, data);
        }
    }
}
