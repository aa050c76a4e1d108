//! Symmetric sealing
//!
//! ```text
//! encrypted_references = AEAD(encode(refs), nonce, key[public_id]) || nonce (12 bytes)
//! ```

use rand::RngCore;

use hoard_core::{HoardError, HoardResult};
use hoard_crypto::{decrypt, encrypt, secure_hash, NONCE_SIZE};
use hoard_secrets::SecretsManager;

/// Nonce for one sealing. A link nonce pins it so the same references and
/// spec always produce the same grant.
fn sealing_nonce(link_nonce: Option<&[u8]>) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    match link_nonce {
        Some(link) => nonce.copy_from_slice(&secure_hash(link)[..NONCE_SIZE]),
        None => rand::thread_rng().fill_bytes(&mut nonce),
    }
    nonce
}

pub fn seal(
    secrets: &SecretsManager,
    plaintext: &[u8],
    public_id: &str,
    link_nonce: Option<&[u8]>,
) -> HoardResult<Vec<u8>> {
    let key = secrets.symmetric(public_id)?;
    let nonce = sealing_nonce(link_nonce);
    let mut sealed = encrypt(plaintext, &nonce, key.as_bytes())?;
    sealed.extend_from_slice(&nonce);
    Ok(sealed)
}

pub fn unseal(secrets: &SecretsManager, sealed: &[u8], public_id: &str) -> HoardResult<Vec<u8>> {
    let key = secrets.symmetric(public_id)?;
    if sealed.len() < NONCE_SIZE {
        return Err(HoardError::Serialization(
            "symmetric grant is shorter than its nonce".into(),
        ));
    }
    let (ciphertext, nonce) = sealed.split_at(sealed.len() - NONCE_SIZE);
    decrypt(ciphertext, nonce, key.as_bytes())
}
