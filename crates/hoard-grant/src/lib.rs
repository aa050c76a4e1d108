//! hoard-grant: portable capabilities over stored references
//!
//! A grant is `{spec, encrypted_references, version}`. The grant spec selects how
//! the canonical reference plaintext is sealed:
//!
//! ```text
//! Plaintext   encode(refs)
//! Symmetric   AEAD(encode(refs), nonce, secrets[public_id]) || nonce
//! Asymmetric  PEM("HOARD GRANT", age(encode(refs), recipient)) + Ed25519 signature
//! ```
//!
//! New grants are always written at [`LATEST_GRANT_VERSION`]; unsealing
//! honours the version recorded in the grant.

pub mod asymmetric;
pub mod spec;
pub mod symmetric;

use hoard_core::reference::{plaintext_from_refs, refs_from_plaintext, check_grant_version};
use hoard_core::{HoardResult, Reference};
use hoard_secrets::SecretsManager;

pub use hoard_core::reference::LATEST_GRANT_VERSION;
pub use spec::{Grant, GrantSpec};

/// Seal `refs` into a new grant under `spec`.
pub fn seal(secrets: &SecretsManager, refs: &[Reference], spec: GrantSpec) -> HoardResult<Grant> {
    spec.validate()?;
    let plaintext = plaintext_from_refs(refs, &[])?;

    let encrypted_references = match &spec {
        GrantSpec::Plaintext {} => plaintext,
        GrantSpec::Symmetric {
            public_id,
            link_nonce,
        } => symmetric::seal(secrets, &plaintext, public_id, link_nonce.as_deref())?,
        GrantSpec::Asymmetric { public_key } => {
            asymmetric::seal(secrets, &plaintext, public_key.as_deref())?
        }
    };

    tracing::debug!(kind = spec.kind(), refs = refs.len(), "sealed grant");
    Ok(Grant {
        spec,
        encrypted_references,
        version: LATEST_GRANT_VERSION,
    })
}

/// Recover the references a grant carries.
pub fn unseal(secrets: &SecretsManager, grant: &Grant) -> HoardResult<Vec<Reference>> {
    check_grant_version(grant.version)?;
    grant.spec.validate()?;

    let plaintext = match &grant.spec {
        GrantSpec::Plaintext {} => grant.encrypted_references.clone(),
        GrantSpec::Symmetric { public_id, .. } => {
            symmetric::unseal(secrets, &grant.encrypted_references, public_id)?
        }
        GrantSpec::Asymmetric { .. } => asymmetric::unseal(secrets, &grant.encrypted_references)?,
    };

    refs_from_plaintext(&plaintext, grant.version)
}

/// Unseal `grant` and seal its references again under `spec`.
pub fn reseal(secrets: &SecretsManager, grant: &Grant, spec: GrantSpec) -> HoardResult<Grant> {
    let refs = unseal(secrets, grant)?;
    seal(secrets, &refs, spec)
}
