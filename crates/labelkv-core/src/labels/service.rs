//! `LabelService`: the public label contract.
//!
//! Each operation runs as one read-write transaction, or as a read-only
//! precondition check followed by a read-write mutation. Two paths span
//! more than one transaction and are not atomic end to end:
//! - `update_label` reads, optionally renames (index only), then writes
//!   the record. A concurrent change between those steps can be lost.
//! - `create_label_mapping` checks for a duplicate, then writes. Two
//!   racing callers can both pass the check.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::LabelServiceConfig;
use crate::error::CoreError;
use crate::id::{Id, IdGenerator, RandomIdGenerator};
use crate::index::{check_unique, index_key, Uniqueness};
use crate::kv::{Store, Tx};

use super::mapping::MappingStore;
use super::ownership::{BucketOwnership, OwnershipRegistry};
use super::store::LabelStore;
use super::types::{
    FindOptions, Label, LabelFilter, LabelMapping, LabelMappingFilter, LabelUpdate, ResourceType,
};

pub struct LabelService<S> {
    store: Arc<S>,
    labels: LabelStore,
    mappings: MappingStore,
    ownership: Arc<dyn OwnershipRegistry>,
}

impl<S: Store> LabelService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<S>) -> LabelServiceBuilder<S> {
        LabelServiceBuilder {
            store,
            config: LabelServiceConfig::default(),
            ids: Arc::new(RandomIdGenerator),
            ownership: Arc::new(BucketOwnership::default()),
        }
    }

    /// Create every bucket the service and its ownership registry write to.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        let mut buckets = vec![
            self.labels.label_bucket().to_string(),
            self.labels.index_bucket().to_string(),
            self.mappings.mapping_bucket().to_string(),
        ];
        buckets.extend(self.ownership.buckets());

        self.store
            .update(cancel, |tx| {
                for name in &buckets {
                    tx.create_bucket(name)
                        .map_err(CoreError::store("create bucket"))?;
                }
                Ok(())
            })
            .await?;

        tracing::info!(?buckets, "label buckets initialized");
        Ok(())
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Create a label, claiming `orgID:name` and registering ownership in
    /// the same transaction. Properties with empty values are dropped.
    /// Returns the label with its assigned id.
    pub async fn create_label(
        &self,
        cancel: &CancellationToken,
        mut label: Label,
    ) -> Result<Label, CoreError> {
        label.validate()?;
        label.name = label.name.trim().to_string();
        if let Some(properties) = label.properties.as_mut() {
            properties.retain(|_, value| !value.is_empty());
        }

        let label = self
            .store
            .update(cancel, move |tx| {
                self.ensure_unique_name(tx, &label)?;
                self.labels.create_label(tx, &mut label)?;
                self.labels.put_index_entry(tx, &label)?;
                self.ownership
                    .register(tx, label.org_id, label.id, ResourceType::Labels)?;
                Ok(label)
            })
            .await?;

        tracing::debug!(
            label_id = %label.id,
            org_id = %label.org_id,
            name = %label.name,
            "created label"
        );
        Ok(label)
    }

    pub async fn find_label_by_id(
        &self,
        cancel: &CancellationToken,
        id: Id,
    ) -> Result<Label, CoreError> {
        self.store
            .view(cancel, |tx| self.labels.get_label(tx, id))
            .await
    }

    /// Labels matching `filter`. An organization plus name lookup goes
    /// through the uniqueness index; anything else scans.
    pub async fn find_labels(
        &self,
        cancel: &CancellationToken,
        filter: &LabelFilter,
        options: &FindOptions,
    ) -> Result<Vec<Label>, CoreError> {
        let labels = self
            .store
            .view(cancel, |tx| match (filter.org_id, filter.name.as_deref()) {
                (Some(org_id), Some(name)) if org_id.is_valid() => Ok(self
                    .labels
                    .find_by_name(tx, org_id, name)?
                    .into_iter()
                    .collect::<Vec<_>>()),
                _ => self.labels.list_labels(tx, filter),
            })
            .await?;

        Ok(options.apply(labels))
    }

    pub async fn find_resource_labels(
        &self,
        cancel: &CancellationToken,
        filter: &LabelMappingFilter,
    ) -> Result<Vec<Label>, CoreError> {
        filter.validate()?;
        self.store
            .view(cancel, |tx| {
                self.mappings.find_by_resource(tx, &self.labels, filter)
            })
            .await
    }

    /// Apply `update` to the label `id` and return the result.
    ///
    /// A rename runs in its own transaction ahead of the final write; if
    /// it fails, nothing from this update is persisted.
    pub async fn update_label(
        &self,
        cancel: &CancellationToken,
        id: Id,
        update: LabelUpdate,
    ) -> Result<Label, CoreError> {
        let mut label = self
            .store
            .view(cancel, |tx| self.labels.get_label(tx, id))
            .await?;

        label.apply_property_deltas(&update.properties);

        if let Some(name) = update.name.as_deref().filter(|name| !name.is_empty()) {
            let name = name.trim();
            if name != label.name {
                let previous = label.name.clone();
                Label {
                    name: name.to_string(),
                    ..label.clone()
                }
                .validate()?;

                label = self
                    .store
                    .update(cancel, move |tx| {
                        self.labels.delete_index_entry(tx, &label)?;
                        label.name = name.to_string();
                        self.ensure_unique_name(tx, &label)?;
                        self.labels.put_index_entry(tx, &label)?;
                        Ok(label)
                    })
                    .await?;

                tracing::debug!(
                    label_id = %id,
                    from = %previous,
                    to = %label.name,
                    "renamed label"
                );
            }
        }

        label.validate()?;

        self.store
            .update(cancel, |tx| self.labels.update_label(tx, &label))
            .await?;

        tracing::debug!(label_id = %id, "updated label");
        Ok(label)
    }

    /// Delete a label, its index entry, and its ownership record. Mappings
    /// that reference it are left in place.
    pub async fn delete_label(&self, cancel: &CancellationToken, id: Id) -> Result<(), CoreError> {
        let label = self
            .store
            .update(cancel, |tx| {
                let label = self.labels.get_label(tx, id)?;
                self.labels.delete_label(tx, id)?;
                self.labels.delete_index_entry(tx, &label)?;
                self.ownership.release(tx, id, ResourceType::Labels)?;
                Ok(label)
            })
            .await?;

        tracing::debug!(
            label_id = %id,
            org_id = %label.org_id,
            name = %label.name,
            "deleted label"
        );
        Ok(())
    }

    // ========================================================================
    // Label mappings
    // ========================================================================

    /// Apply a label to a resource. Fails if the label does not exist or is
    /// already applied to that resource.
    pub async fn create_label_mapping(
        &self,
        cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> Result<(), CoreError> {
        mapping.validate()?;
        let filter = LabelMappingFilter::for_resource(mapping.resource_id, mapping.resource_type);

        self.store
            .view(cancel, |tx| {
                self.labels.get_label(tx, mapping.label_id)?;
                let applied = self.mappings.find_by_resource(tx, &self.labels, &filter)?;
                if applied.iter().any(|label| label.id == mapping.label_id) {
                    return Err(CoreError::LabelExistsOnResource {
                        label_id: mapping.label_id,
                        resource_id: mapping.resource_id,
                    });
                }
                Ok(())
            })
            .await?;

        self.store
            .update(cancel, |tx| self.mappings.create_mapping(tx, mapping))
            .await?;

        tracing::debug!(
            label_id = %mapping.label_id,
            resource_id = %mapping.resource_id,
            resource_type = %mapping.resource_type,
            "created label mapping"
        );
        Ok(())
    }

    /// Remove a label from a resource. Removing an absent mapping succeeds.
    pub async fn delete_label_mapping(
        &self,
        cancel: &CancellationToken,
        mapping: &LabelMapping,
    ) -> Result<(), CoreError> {
        mapping.validate()?;
        self.store
            .update(cancel, |tx| self.mappings.delete_mapping(tx, mapping))
            .await?;

        tracing::debug!(
            label_id = %mapping.label_id,
            resource_id = %mapping.resource_id,
            "deleted label mapping"
        );
        Ok(())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn ensure_unique_name(&self, tx: &mut dyn Tx, label: &Label) -> Result<(), CoreError> {
        let key = index_key(label.org_id, &label.name)?;
        match check_unique(tx, self.labels.index_bucket(), &key)? {
            Uniqueness::Unique => Ok(()),
            Uniqueness::NotUnique => Err(CoreError::LabelAlreadyExists {
                org_id: label.org_id,
                name: label.name.clone(),
            }),
        }
    }
}

// ==============================================================================
// Builder
// ==============================================================================

pub struct LabelServiceBuilder<S> {
    store: Arc<S>,
    config: LabelServiceConfig,
    ids: Arc<dyn IdGenerator>,
    ownership: Arc<dyn OwnershipRegistry>,
}

impl<S: Store> LabelServiceBuilder<S> {
    pub fn config(mut self, config: LabelServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn ownership(mut self, ownership: Arc<dyn OwnershipRegistry>) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn build(self) -> LabelService<S> {
        let LabelServiceConfig {
            label_bucket,
            mapping_bucket,
            index_bucket,
            max_id_attempts,
        } = self.config;

        LabelService {
            store: self.store,
            labels: LabelStore::new(label_bucket, index_bucket, self.ids, max_id_attempts),
            mappings: MappingStore::new(mapping_bucket),
            ownership: self.ownership,
        }
    }
}
