//! Transactional key-value store abstraction.
//!
//! Defines the [`Store`] trait consumed by the label service, the
//! [`Tx`]/[`Bucket`] handles a transaction exposes, and an in-memory
//! engine ([`MemoryStore`]) used by default and in tests.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// A key/value pair yielded by [`Bucket::scan_prefix`].
pub type Entry = (Vec<u8>, Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("transaction is read-only")]
    ReadOnly,

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Transactional store: every read runs in [`Store::view`], every write in
/// [`Store::update`].
///
/// The closure runs synchronously against one transaction. `update`
/// commits when it returns `Ok` and discards every write otherwise; a
/// cancelled token aborts the transaction instead of committing it.
#[async_trait]
pub trait Store: Send + Sync {
    async fn view<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut dyn Tx) -> Result<T, CoreError> + Send;

    async fn update<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut dyn Tx) -> Result<T, CoreError> + Send;
}

/// An open transaction.
pub trait Tx {
    /// Open an existing bucket.
    fn bucket(&mut self, name: &str) -> Result<Box<dyn Bucket + '_>, StoreError>;

    /// Create a bucket if it does not already exist.
    fn create_bucket(&mut self, name: &str) -> Result<(), StoreError>;
}

/// A named, sorted key-to-value partition inside a transaction.
pub trait Bucket {
    /// Returns [`StoreError::KeyNotFound`] when `key` is absent.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deleting an absent key succeeds.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>, StoreError>;
}
