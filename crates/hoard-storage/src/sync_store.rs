//! Address-partitioned read/write locking around a [`Store`]
//!
//! Addresses are spread over a fixed pool of `RwLock`s by a fast
//! non-cryptographic hash. Two addresses in the same bucket share a lock,
//! which only costs contention. Readers of one address never overlap with a
//! writer of that address.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hoard_core::{HoardResult, StatInfo};

use crate::store::Store;

pub const DEFAULT_ADDRESS_LOCK_COUNT: usize = 127;

pub struct AddressLock {
    locks: Vec<RwLock<()>>,
}

impl AddressLock {
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        Self {
            locks: (0..count).map(|_| RwLock::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn index(&self, address: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        (hasher.finish() % self.locks.len() as u64) as usize
    }

    pub async fn read(&self, address: &[u8]) -> RwLockReadGuard<'_, ()> {
        self.locks[self.index(address)].read().await
    }

    pub async fn write(&self, address: &[u8]) -> RwLockWriteGuard<'_, ()> {
        self.locks[self.index(address)].write().await
    }
}

impl Default for AddressLock {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_LOCK_COUNT)
    }
}

/// A [`Store`] whose calls are serialized per address bucket.
pub struct SyncStore {
    inner: Arc<dyn Store>,
    lock: AddressLock,
}

impl SyncStore {
    pub fn new(inner: Arc<dyn Store>, lock_count: usize) -> Self {
        Self {
            inner,
            lock: AddressLock::new(lock_count),
        }
    }
}

#[async_trait]
impl Store for SyncStore {
    async fn put(&self, address: &[u8], data: Vec<u8>) -> HoardResult<Vec<u8>> {
        let _guard = self.lock.write(address).await;
        self.inner.put(address, data).await
    }

    async fn get(&self, address: &[u8]) -> HoardResult<Vec<u8>> {
        let _guard = self.lock.read(address).await;
        self.inner.get(address).await
    }

    async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo> {
        let _guard = self.lock.read(address).await;
        self.inner.stat(address).await
    }

    async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        let _guard = self.lock.write(address).await;
        self.inner.delete(address).await
    }

    fn location(&self, address: &[u8]) -> String {
        self.inner.location(address)
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
