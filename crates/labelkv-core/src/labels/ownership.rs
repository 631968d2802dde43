//! Resource ownership hook invoked when labels are created or deleted.
//!
//! Records that a label is an owned resource of its organization. What
//! the record means for authorization is decided elsewhere.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::Id;
use crate::kv::Tx;

use super::types::ResourceType;

/// Called inside the label service's own transaction, so a failure here
/// aborts the surrounding create or delete.
pub trait OwnershipRegistry: Send + Sync {
    fn register(
        &self,
        tx: &mut dyn Tx,
        org_id: Id,
        resource_id: Id,
        resource_type: ResourceType,
    ) -> Result<(), CoreError>;

    fn release(
        &self,
        tx: &mut dyn Tx,
        resource_id: Id,
        resource_type: ResourceType,
    ) -> Result<(), CoreError>;

    /// Buckets this registry writes to, created by `LabelService::initialize`.
    fn buckets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Ownership record stored by [`BucketOwnership`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    #[serde(rename = "orgID")]
    pub org_id: Id,
    #[serde(rename = "resourceID")]
    pub resource_id: Id,
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceType,
}

/// Keeps ownership records in a bucket of the same store, keyed by
/// `<resourceID><orgID>`.
pub struct BucketOwnership {
    bucket: String,
}

impl BucketOwnership {
    pub const DEFAULT_BUCKET: &'static str = "userresourcemappingsv1";

    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ownership records for `resource_id`.
    pub fn owners(&self, tx: &mut dyn Tx, resource_id: Id) -> Result<Vec<OwnershipRecord>, CoreError> {
        let prefix = resource_id.encode()?;
        tx.bucket(&self.bucket)
            .map_err(CoreError::store("open ownership bucket"))?
            .scan_prefix(&prefix)
            .map_err(CoreError::store("scan ownership records"))?
            .into_iter()
            .map(|(_, raw)| {
                serde_json::from_slice(&raw).map_err(|source| CoreError::Codec {
                    entity: "ownership record",
                    source,
                })
            })
            .collect()
    }
}

impl Default for BucketOwnership {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUCKET)
    }
}

impl OwnershipRegistry for BucketOwnership {
    fn register(
        &self,
        tx: &mut dyn Tx,
        org_id: Id,
        resource_id: Id,
        resource_type: ResourceType,
    ) -> Result<(), CoreError> {
        let record = OwnershipRecord {
            org_id,
            resource_id,
            resource_type,
        };
        let mut key = resource_id.encode()?.to_vec();
        key.extend_from_slice(&org_id.encode()?);
        let value = serde_json::to_vec(&record).map_err(|source| CoreError::Codec {
            entity: "ownership record",
            source,
        })?;

        tx.bucket(&self.bucket)
            .map_err(CoreError::store("open ownership bucket"))?
            .put(&key, &value)
            .map_err(CoreError::store("write ownership record"))
    }

    fn release(
        &self,
        tx: &mut dyn Tx,
        resource_id: Id,
        resource_type: ResourceType,
    ) -> Result<(), CoreError> {
        let prefix = resource_id.encode()?;
        let mut bucket = tx
            .bucket(&self.bucket)
            .map_err(CoreError::store("open ownership bucket"))?;
        let entries = bucket
            .scan_prefix(&prefix)
            .map_err(CoreError::store("scan ownership records"))?;

        for (key, raw) in entries {
            let record: OwnershipRecord =
                serde_json::from_slice(&raw).map_err(|source| CoreError::Codec {
                    entity: "ownership record",
                    source,
                })?;
            if record.resource_type == resource_type {
                bucket
                    .delete(&key)
                    .map_err(CoreError::store("delete ownership record"))?;
            }
        }
        Ok(())
    }

    fn buckets(&self) -> Vec<String> {
        vec![self.bucket.clone()]
    }
}
