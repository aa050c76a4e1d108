use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use hoard_core::encoding::address_key;
use hoard_core::{HoardResult, StatInfo};

use crate::store::Store;

/// Emits a `tracing` event for every store call.
pub struct LoggingStore {
    inner: Arc<dyn Store>,
}

impl LoggingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self { inner }
    }
}

fn outcome<T>(result: &HoardResult<T>) -> String {
    match result {
        Ok(_) => "ok".into(),
        Err(e) => e.to_string(),
    }
}

#[async_trait]
impl Store for LoggingStore {
    async fn put(&self, address: &[u8], data: Vec<u8>) -> HoardResult<Vec<u8>> {
        let len = data.len();
        let result = self.inner.put(address, data).await;
        debug!(
            method = "put",
            store = %self.inner.name(),
            address = %address_key(address),
            bytes = len,
            outcome = %outcome(&result),
        );
        result
    }

    async fn get(&self, address: &[u8]) -> HoardResult<Vec<u8>> {
        let result = self.inner.get(address).await;
        debug!(
            method = "get",
            store = %self.inner.name(),
            address = %address_key(address),
            bytes = result.as_ref().map(Vec::len).unwrap_or(0),
            outcome = %outcome(&result),
        );
        result
    }

    async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo> {
        let result = self.inner.stat(address).await;
        debug!(
            method = "stat",
            store = %self.inner.name(),
            address = %address_key(address),
            exists = result.as_ref().map(|s| s.exists).unwrap_or(false),
            outcome = %outcome(&result),
        );
        result
    }

    async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        let result = self.inner.delete(address).await;
        debug!(
            method = "delete",
            store = %self.inner.name(),
            address = %address_key(address),
            outcome = %outcome(&result),
        );
        result
    }

    fn location(&self, address: &[u8]) -> String {
        self.inner.location(address)
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
