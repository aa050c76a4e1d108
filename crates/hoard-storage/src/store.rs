//! The Store contract and its OpenDAL-backed implementation

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};

use hoard_core::encoding::address_key;
use hoard_core::{HoardError, HoardResult, StatInfo};

/// Raw byte storage keyed by address.
///
/// Implementations do not interpret the bytes and do not check that an
/// address matches its data; [`crate::ContentAddressedStore`] does that.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store `data` under `address`, returning the address.
    async fn put(&self, address: &[u8], data: Vec<u8>) -> HoardResult<Vec<u8>>;

    /// Fetch the bytes at `address`. Absent data is `NotFound`.
    async fn get(&self, address: &[u8]) -> HoardResult<Vec<u8>>;

    /// Report whether `address` exists. Absence is not an error.
    async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo>;

    async fn delete(&self, address: &[u8]) -> HoardResult<()>;

    /// Human-readable URI of `address` within this backend.
    fn location(&self, address: &[u8]) -> String;

    fn name(&self) -> String;
}

/// [`Store`] over any OpenDAL operator (memory, filesystem, S3, ...).
pub struct OperatorStore {
    op: Operator,
}

impl OperatorStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn path(address: &[u8]) -> String {
        format!("blobs/{}", address_key(address))
    }
}

fn storage_error(action: &str, address: &[u8], err: opendal::Error) -> HoardError {
    if err.kind() == ErrorKind::NotFound {
        HoardError::NotFound(address_key(address))
    } else {
        HoardError::Storage(format!("{action} {}: {err}", address_key(address)))
    }
}

#[async_trait]
impl Store for OperatorStore {
    async fn put(&self, address: &[u8], data: Vec<u8>) -> HoardResult<Vec<u8>> {
        self.op
            .write(&Self::path(address), data)
            .await
            .map_err(|e| storage_error("writing", address, e))?;
        Ok(address.to_vec())
    }

    async fn get(&self, address: &[u8]) -> HoardResult<Vec<u8>> {
        let buf = self
            .op
            .read(&Self::path(address))
            .await
            .map_err(|e| storage_error("reading", address, e))?;
        Ok(buf.to_vec())
    }

    async fn stat(&self, address: &[u8]) -> HoardResult<StatInfo> {
        match self.op.stat(&Self::path(address)).await {
            Ok(meta) => Ok(StatInfo {
                exists: true,
                size: meta.content_length(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StatInfo::default()),
            Err(e) => Err(storage_error("stat", address, e)),
        }
    }

    async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        self.op
            .delete(&Self::path(address))
            .await
            .map_err(|e| storage_error("deleting", address, e))
    }

    fn location(&self, address: &[u8]) -> String {
        let info = self.op.info();
        format!(
            "{}://{}{}",
            info.scheme(),
            info.root().trim_start_matches('/'),
            Self::path(address)
        )
    }

    fn name(&self) -> String {
        self.op.info().scheme().to_string()
    }
}
