//! Asymmetric sealing with age X25519 recipients
//!
//! The age ciphertext is ASCII-armored in a PEM block tagged `HOARD GRANT`,
//! with the sealer's Ed25519 public key and its signature over the ciphertext
//! carried as armor headers:
//!
//! ```text
//! -----BEGIN HOARD GRANT-----
//! Signer: <base64 public key>
//! Signature: <base64 signature>
//!
//! <base64 age ciphertext>
//! -----END HOARD GRANT-----
//! ```
//!
//! The tag is checked first and the signature is verified against trusted
//! keys before any decryption is attempted.

use age::x25519;
use ed25519_dalek::Signature;

use hoard_core::encoding::{from_base64, to_base64};
use hoard_core::{HoardError, HoardResult};
use hoard_secrets::signing::parse_public_key;
use hoard_secrets::SecretsManager;

pub const ARMOR_TAG: &str = "HOARD GRANT";
pub const SIGNER_HEADER: &str = "Signer";
pub const SIGNATURE_HEADER: &str = "Signature";

fn recipient(secrets: &SecretsManager, public_key: Option<&str>) -> HoardResult<x25519::Recipient> {
    match public_key {
        Some(key) => key
            .trim()
            .parse::<x25519::Recipient>()
            .map_err(|e| HoardError::InvalidSpec(format!("invalid age recipient: {e}"))),
        None => secrets
            .keyring()
            .map(|k| k.recipient())
            .ok_or_else(|| {
                HoardError::SecretNotFound("no public key given and no keyring configured".into())
            }),
    }
}

pub fn seal(
    secrets: &SecretsManager,
    plaintext: &[u8],
    public_key: Option<&str>,
) -> HoardResult<Vec<u8>> {
    let recipient = recipient(secrets, public_key)?;
    let signer = secrets
        .signer()
        .ok_or_else(|| HoardError::SecretNotFound("no signing key configured".into()))?;

    let ciphertext = age::encrypt(&recipient, plaintext)
        .map_err(|e| HoardError::Other(anyhow::anyhow!("age encryption failed: {e}")))?;
    let signature = signer.sign(&ciphertext);

    let armor_err = |e: pem::PemError| HoardError::Other(anyhow::anyhow!("writing grant armor: {e}"));
    let mut block = pem::Pem::new(ARMOR_TAG, ciphertext);
    block
        .headers_mut()
        .add(SIGNER_HEADER, &signer.public_key_base64())
        .map_err(armor_err)?;
    block
        .headers_mut()
        .add(SIGNATURE_HEADER, &to_base64(&signature.to_bytes()))
        .map_err(armor_err)?;
    Ok(pem::encode(&block).into_bytes())
}

pub fn unseal(secrets: &SecretsManager, armored: &[u8]) -> HoardResult<Vec<u8>> {
    let block = pem::parse(armored)
        .map_err(|e| HoardError::Serialization(format!("reading grant armor: {e}")))?;
    if block.tag() != ARMOR_TAG {
        return Err(HoardError::protocol(format!(
            "expected armor block '{ARMOR_TAG}', found '{}'",
            block.tag()
        )));
    }
    let keyring = secrets
        .keyring()
        .ok_or_else(|| HoardError::SecretNotFound("no keyring configured".into()))?;
    let signer = secrets
        .signer()
        .ok_or_else(|| HoardError::SecretNotFound("no signing key configured".into()))?;

    let headers = block.headers();
    let (Some(sealer), Some(signature)) = (headers.get(SIGNER_HEADER), headers.get(SIGNATURE_HEADER)) else {
        tracing::debug!("grant is not signed");
        return Err(HoardError::AuthenticationFailure);
    };
    let sealer = parse_public_key(sealer).map_err(|_| HoardError::AuthenticationFailure)?;
    let signature = from_base64(signature)
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or(HoardError::AuthenticationFailure)?;
    signer.verify(block.contents(), &sealer, &signature)?;

    keyring.decrypt(block.contents())
}
