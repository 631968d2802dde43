//! Shared test helpers for `labelkv-core` unit tests.
//!
//! Deterministic id generation, a store pre-seeded with the default
//! buckets, and a transaction double that injects storage faults.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::LabelServiceConfig;
use crate::id::{Id, IdGenerator};
use crate::kv::{Bucket, Entry, MemoryStore, StoreError, Tx};
use crate::labels::{BucketOwnership, LabelMapping, LabelStore, ResourceType};

// ==============================================================================
// Id Helpers
// ==============================================================================

/// Yields 1, 2, 3, ... or, when stuck, the invalid id forever.
pub struct SequentialIds {
    next: AtomicU64,
    step: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            step: 1,
        }
    }

    pub fn stuck() -> Self {
        Self {
            next: AtomicU64::new(0),
            step: 0,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn id(&self) -> Id {
        Id::new(self.next.fetch_add(self.step, Ordering::SeqCst))
    }
}

// ==============================================================================
// Store Builders
// ==============================================================================

/// A memory store holding every bucket the default configuration uses.
pub fn memory_store() -> MemoryStore {
    let config = LabelServiceConfig::default();
    MemoryStore::with_buckets([
        config.label_bucket,
        config.mapping_bucket,
        config.index_bucket,
        BucketOwnership::DEFAULT_BUCKET.to_string(),
    ])
}

/// A label adapter over the default buckets with sequential ids.
pub fn label_store() -> LabelStore {
    let config = LabelServiceConfig::default();
    LabelStore::new(
        config.label_bucket,
        config.index_bucket,
        Arc::new(SequentialIds::new()),
        config.max_id_attempts,
    )
}

pub fn mapping(resource_id: u64, resource_type: ResourceType, label_id: u64) -> LabelMapping {
    LabelMapping {
        resource_id: Id::new(resource_id),
        resource_type,
        label_id: Id::new(label_id),
    }
}

// ==============================================================================
// Fault Injection
// ==============================================================================

/// A transaction whose buckets open fine but fail every read.
pub struct FaultyTx {
    message: String,
}

impl FaultyTx {
    pub fn failing_gets(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Tx for FaultyTx {
    fn bucket(&mut self, _name: &str) -> Result<Box<dyn Bucket + '_>, StoreError> {
        Ok(Box::new(FaultyBucket {
            message: self.message.clone(),
        }))
    }

    fn create_bucket(&mut self, _name: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

struct FaultyBucket {
    message: String,
}

impl Bucket for FaultyBucket {
    fn get(&self, _key: &[u8]) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::Backend(self.message.clone()))
    }

    fn put(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        Ok(())
    }

    fn delete(&mut self, _key: &[u8]) -> Result<(), StoreError> {
        Ok(())
    }

    fn scan_prefix(&self, _prefix: &[u8]) -> Result<Vec<Entry>, StoreError> {
        Err(StoreError::Backend(self.message.clone()))
    }
}
