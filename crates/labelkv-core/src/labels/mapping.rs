//! `MappingStore`: resource-to-label associations.
//!
//! Mappings are keyed by `<resourceID><resourceType>:<labelID>`, so a
//! mapping's identity covers all three fields and one prefix scan yields
//! every label applied to a resource of a given type.

use crate::error::CoreError;
use crate::id::{Id, ID_LENGTH};
use crate::kv::Tx;

use super::store::LabelStore;
use super::types::{Label, LabelMapping, LabelMappingFilter, ResourceType};

pub struct MappingStore {
    mapping_bucket: String,
}

impl MappingStore {
    pub fn new(mapping_bucket: impl Into<String>) -> Self {
        Self {
            mapping_bucket: mapping_bucket.into(),
        }
    }

    pub fn mapping_bucket(&self) -> &str {
        &self.mapping_bucket
    }

    pub fn create_mapping(&self, tx: &mut dyn Tx, mapping: &LabelMapping) -> Result<(), CoreError> {
        let key = mapping_key(mapping)?;
        let value = serde_json::to_vec(mapping).map_err(|source| CoreError::Codec {
            entity: "label mapping",
            source,
        })?;
        tx.bucket(&self.mapping_bucket)
            .map_err(CoreError::store("open label mapping bucket"))?
            .put(&key, &value)
            .map_err(CoreError::store("write label mapping"))
    }

    /// Absent mappings are not an error.
    pub fn delete_mapping(&self, tx: &mut dyn Tx, mapping: &LabelMapping) -> Result<(), CoreError> {
        let key = mapping_key(mapping)?;
        tx.bucket(&self.mapping_bucket)
            .map_err(CoreError::store("open label mapping bucket"))?
            .delete(&key)
            .map_err(CoreError::store("delete label mapping"))
    }

    /// Mappings recorded for the filtered resource, in label-id order.
    pub fn list_mappings(
        &self,
        tx: &mut dyn Tx,
        filter: &LabelMappingFilter,
    ) -> Result<Vec<LabelMapping>, CoreError> {
        let prefix = resource_prefix(filter.resource_id, filter.resource_type)?;
        let entries = tx
            .bucket(&self.mapping_bucket)
            .map_err(CoreError::store("open label mapping bucket"))?
            .scan_prefix(&prefix)
            .map_err(CoreError::store("scan label mappings"))?;

        let mut mappings = Vec::with_capacity(entries.len());
        for (_, raw) in entries {
            let mapping: LabelMapping =
                serde_json::from_slice(&raw).map_err(|source| CoreError::Codec {
                    entity: "label mapping",
                    source,
                })?;
            if filter.label_id.is_some_and(|id| id != mapping.label_id) {
                continue;
            }
            mappings.push(mapping);
        }
        Ok(mappings)
    }

    /// Join the resource's mappings with label primary records. Mappings
    /// whose label no longer exists are skipped.
    pub fn find_by_resource(
        &self,
        tx: &mut dyn Tx,
        labels: &LabelStore,
        filter: &LabelMappingFilter,
    ) -> Result<Vec<Label>, CoreError> {
        let mappings = self.list_mappings(tx, filter)?;

        let mut found = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            match labels.get_label(tx, mapping.label_id) {
                Ok(label) => found.push(label),
                Err(CoreError::LabelNotFound(label_id)) => {
                    tracing::warn!(
                        %label_id,
                        resource_id = %mapping.resource_id,
                        resource_type = %mapping.resource_type,
                        "skipping mapping to deleted label"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }
}

const TYPE_SEPARATOR: u8 = b':';

fn resource_prefix(resource_id: Id, resource_type: ResourceType) -> Result<Vec<u8>, CoreError> {
    let resource = resource_id.encode()?;
    let resource_type = resource_type.to_string();
    let mut prefix = Vec::with_capacity(ID_LENGTH * 2 + resource_type.len() + 1);
    prefix.extend_from_slice(&resource);
    prefix.extend_from_slice(resource_type.as_bytes());
    prefix.push(TYPE_SEPARATOR);
    Ok(prefix)
}

fn mapping_key(mapping: &LabelMapping) -> Result<Vec<u8>, CoreError> {
    let mut key = resource_prefix(mapping.resource_id, mapping.resource_type)?;
    key.extend_from_slice(&mapping.label_id.encode()?);
    Ok(key)
}
