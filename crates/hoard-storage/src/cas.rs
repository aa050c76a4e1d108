use std::sync::Arc;

use hoard_core::{HoardResult, StatInfo};
use hoard_crypto::secure_hash;

use crate::store::Store;

/// A store whose addresses are the hash of the stored bytes.
#[derive(Clone)]
pub struct ContentAddressedStore {
    store: Arc<dyn Store>,
}

impl ContentAddressedStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn address(data: &[u8]) -> Vec<u8> {
        secure_hash(data).to_vec()
    }

    /// Store `data` under its own hash. Data that already exists is not
    /// written again.
    pub async fn put(&self, data: Vec<u8>) -> HoardResult<Vec<u8>> {
        let address = Self::address(&data);
        if self.store.stat(&address).await?.exists {
            return Ok(address);
        }
        self.store.put(&address, data).await
    }

    pub async fn get(&self, address: &[u8]) -> HoardResult<Vec<u8>> {
        self.store.get(address).await
    }

    pub async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo> {
        self.store.stat(address).await
    }

    pub async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        self.store.delete(address).await
    }

    pub fn location(&self, address: &[u8]) -> String {
        self.store.location(address)
    }

    pub fn name(&self) -> String {
        self.store.name()
    }
}
