use std::sync::Arc;

use hoard_core::{HoardResult, Reference, StatInfo};
use hoard_crypto::{decrypt_convergent, encrypt_convergent};
use hoard_grant::{Grant, GrantSpec};
use hoard_secrets::SecretsManager;
use hoard_storage::{content_addressed, ContentAddressedStore, Store};

/// Object-level operations: convergent encryption in front of a
/// content-addressed store, plus grant sealing with the configured secrets.
#[derive(Clone)]
pub struct Hoard {
    store: ContentAddressedStore,
    secrets: SecretsManager,
}

impl Hoard {
    pub fn new(store: ContentAddressedStore, secrets: SecretsManager) -> Self {
        Self { store, secrets }
    }

    /// Wrap `backend` with address locking and logging.
    pub fn from_backend(backend: Arc<dyn Store>, secrets: SecretsManager, address_lock_count: usize) -> Self {
        Self::new(content_addressed(backend, address_lock_count), secrets)
    }

    /// Encrypt without storing. The reference carries the address the
    /// ciphertext would be stored under.
    pub fn encrypt(&self, data: &[u8], salt: &[u8]) -> HoardResult<(Reference, Vec<u8>)> {
        let blob = encrypt_convergent(data, salt)?;
        let address = ContentAddressedStore::address(&blob.encrypted_data);
        let reference = Reference::new(address, blob.secret_key, salt, data.len() as i64);
        Ok((reference, blob.encrypted_data))
    }

    pub fn decrypt(&self, reference: &Reference, ciphertext: &[u8]) -> HoardResult<Vec<u8>> {
        decrypt_convergent(ciphertext, &reference.salt, &reference.secret_key)
    }

    /// Encrypt and store `data`, returning a DATA reference to it.
    pub async fn put(&self, data: &[u8], salt: &[u8]) -> HoardResult<Reference> {
        let (reference, ciphertext) = self.encrypt(data, salt)?;
        self.store.put(ciphertext).await?;
        Ok(reference)
    }

    /// Fetch and decrypt the plaintext behind `reference`.
    pub async fn get(&self, reference: &Reference) -> HoardResult<Vec<u8>> {
        let ciphertext = self.store.get(&reference.address).await?;
        self.decrypt(reference, &ciphertext)
    }

    pub async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo> {
        self.store.stat(address).await
    }

    pub async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        self.store.delete(address).await
    }

    pub fn seal(&self, refs: &[Reference], spec: GrantSpec) -> HoardResult<Grant> {
        hoard_grant::seal(&self.secrets, refs, spec)
    }

    pub fn unseal(&self, grant: &Grant) -> HoardResult<Vec<Reference>> {
        hoard_grant::unseal(&self.secrets, grant)
    }

    pub fn reseal(&self, grant: &Grant, spec: GrantSpec) -> HoardResult<Grant> {
        hoard_grant::reseal(&self.secrets, grant, spec)
    }

    pub fn store(&self) -> &ContentAddressedStore {
        &self.store
    }

    pub fn secrets(&self) -> &SecretsManager {
        &self.secrets
    }
}
