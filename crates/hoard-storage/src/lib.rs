//! hoard-storage: content-addressed storage over OpenDAL
//!
//! Layering used by the service:
//!
//! ```text
//! ContentAddressedStore ─▶ LoggingStore ─▶ SyncStore ─▶ OperatorStore ─▶ opendal::Operator
//! ```

pub mod cas;
pub mod logging_store;
pub mod operator;
pub mod store;
pub mod sync_store;

use std::sync::Arc;

pub use cas::ContentAddressedStore;
pub use logging_store::LoggingStore;
pub use operator::{build_operator, S3Credentials};
pub use store::{OperatorStore, Store};
pub use sync_store::{AddressLock, SyncStore, DEFAULT_ADDRESS_LOCK_COUNT};

/// Wrap a backend in the standard locking and logging layers.
pub fn content_addressed(backend: Arc<dyn Store>, address_lock_count: usize) -> ContentAddressedStore {
    let synced: Arc<dyn Store> = Arc::new(SyncStore::new(backend, address_lock_count));
    ContentAddressedStore::new(Arc::new(LoggingStore::new(synced)))
}
