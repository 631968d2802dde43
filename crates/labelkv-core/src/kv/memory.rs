use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

use super::{Bucket, Entry, Store, StoreError, Tx};

type Entries = BTreeMap<Vec<u8>, Vec<u8>>;
type Buckets = BTreeMap<String, Entries>;

// ==============================================================================
// Memory Store
// ==============================================================================

/// In-memory transactional store.
///
/// Readers share the committed state behind a `tokio::sync::RwLock`.
/// Writers are serialized: each `update` works on a private copy of the
/// buckets and swaps it in only on successful commit, so a failed or
/// cancelled transaction leaves no trace.
///
/// Every `update` clones the full bucket map, so a write costs time
/// proportional to the whole data set. Meant for tests and small data sets.
pub struct MemoryStore {
    buckets: RwLock<Buckets>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a store with the named buckets already created.
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = names
            .into_iter()
            .map(|name| (name.into(), Entries::new()))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn view<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut dyn Tx) -> Result<T, CoreError> + Send,
    {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled.into()),
            guard = self.buckets.read() => guard,
        };

        let mut tx = ReadTx {
            buckets: &*guard,
            cancel,
        };
        f(&mut tx)
    }

    async fn update<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut dyn Tx) -> Result<T, CoreError> + Send,
    {
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled.into()),
            guard = self.buckets.write() => guard,
        };

        let mut working = guard.clone();
        let result = {
            let mut tx = WriteTx {
                buckets: &mut working,
                cancel,
            };
            f(&mut tx)
        };

        match result {
            Ok(value) => {
                if cancel.is_cancelled() {
                    tracing::debug!("transaction cancelled before commit; rolling back");
                    return Err(StoreError::Cancelled.into());
                }
                *guard = working;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

// ==============================================================================
// Transactions
// ==============================================================================

struct ReadTx<'a> {
    buckets: &'a Buckets,
    cancel: &'a CancellationToken,
}

impl Tx for ReadTx<'_> {
    fn bucket(&mut self, name: &str) -> Result<Box<dyn Bucket + '_>, StoreError> {
        ensure_live(self.cancel)?;
        let entries = self
            .buckets
            .get(name)
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))?;
        Ok(Box::new(ReadBucket {
            entries,
            cancel: self.cancel,
        }))
    }

    fn create_bucket(&mut self, _name: &str) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

struct WriteTx<'a> {
    buckets: &'a mut Buckets,
    cancel: &'a CancellationToken,
}

impl Tx for WriteTx<'_> {
    fn bucket(&mut self, name: &str) -> Result<Box<dyn Bucket + '_>, StoreError> {
        ensure_live(self.cancel)?;
        let entries = self
            .buckets
            .get_mut(name)
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))?;
        Ok(Box::new(WriteBucket {
            entries,
            cancel: self.cancel,
        }))
    }

    fn create_bucket(&mut self, name: &str) -> Result<(), StoreError> {
        ensure_live(self.cancel)?;
        self.buckets.entry(name.to_string()).or_default();
        Ok(())
    }
}

// ==============================================================================
// Buckets
// ==============================================================================

struct ReadBucket<'a> {
    entries: &'a Entries,
    cancel: &'a CancellationToken,
}

impl Bucket for ReadBucket<'_> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        ensure_live(self.cancel)?;
        lookup(self.entries, key)
    }

    fn put(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn delete(&mut self, _key: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>, StoreError> {
        ensure_live(self.cancel)?;
        Ok(scan(self.entries, prefix))
    }
}

struct WriteBucket<'a> {
    entries: &'a mut Entries,
    cancel: &'a CancellationToken,
}

impl Bucket for WriteBucket<'_> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        ensure_live(self.cancel)?;
        lookup(&*self.entries, key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        ensure_live(self.cancel)?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        ensure_live(self.cancel)?;
        self.entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>, StoreError> {
        ensure_live(self.cancel)?;
        Ok(scan(&*self.entries, prefix))
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), StoreError> {
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    Ok(())
}

fn lookup(entries: &Entries, key: &[u8]) -> Result<Vec<u8>, StoreError> {
    entries.get(key).cloned().ok_or(StoreError::KeyNotFound)
}

fn scan(entries: &Entries, prefix: &[u8]) -> Vec<Entry> {
    entries
        .range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
