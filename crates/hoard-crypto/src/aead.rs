//! Nonce-based AEAD for sealing symmetric grants
//!
//! ChaCha20-Poly1305 with a 96-bit nonce supplied by the caller. Nonce
//! reuse under one key breaks confidentiality, so callers pick a fresh
//! random nonce unless they deliberately want a reproducible grant.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

use hoard_core::{HoardError, HoardResult};

use crate::{KEY_SIZE, NONCE_SIZE};

pub fn encrypt(data: &[u8], nonce: &[u8], key: &[u8]) -> HoardResult<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = check_nonce(nonce)?;
    cipher
        .encrypt(nonce, data)
        .map_err(|_| HoardError::Other(anyhow::anyhow!("AEAD encryption failed")))
}

pub fn decrypt(encrypted: &[u8], nonce: &[u8], key: &[u8]) -> HoardResult<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = check_nonce(nonce)?;
    cipher
        .decrypt(nonce, encrypted)
        .map_err(|_| HoardError::AuthenticationFailure)
}

fn cipher(key: &[u8]) -> HoardResult<ChaCha20Poly1305> {
    if key.len() != KEY_SIZE {
        return Err(HoardError::InvalidKey(format!(
            "AEAD key must be {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
}

fn check_nonce(nonce: &[u8]) -> HoardResult<&Nonce> {
    if nonce.len() != NONCE_SIZE {
        return Err(HoardError::InvalidKey(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }
    Ok(Nonce::from_slice(nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x11; KEY_SIZE];
    const NONCE: [u8; NONCE_SIZE] = [0x22; NONCE_SIZE];

    #[test]
    fn test_roundtrip() {
        let encrypted = encrypt(b"references", &NONCE, &KEY).unwrap();
        assert_eq!(encrypted.len(), b"references".len() + crate::TAG_SIZE);
        assert_eq!(decrypt(&encrypted, &NONCE, &KEY).unwrap(), b"references");
    }

    #[test]
    fn test_wrong_key() {
        let encrypted = encrypt(b"references", &NONCE, &KEY).unwrap();
        let result = decrypt(&encrypted, &NONCE, &[0x33; KEY_SIZE]);
        assert!(matches!(result, Err(HoardError::AuthenticationFailure)));
    }

    #[test]
    fn test_wrong_nonce() {
        let encrypted = encrypt(b"references", &NONCE, &KEY).unwrap();
        let result = decrypt(&encrypted, &[0x44; NONCE_SIZE], &KEY);
        assert!(matches!(result, Err(HoardError::AuthenticationFailure)));
    }

    #[test]
    fn test_bad_lengths() {
        assert!(matches!(
            encrypt(b"x", &NONCE, &[0u8; 16]),
            Err(HoardError::InvalidKey(_))
        ));
        assert!(matches!(
            encrypt(b"x", &[0u8; 24], &KEY),
            Err(HoardError::InvalidKey(_))
        ));
    }
}
