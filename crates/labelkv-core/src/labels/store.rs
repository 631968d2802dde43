//! `LabelStore`: label CRUD primitives against the primary and index
//! buckets, always inside a caller-supplied transaction.
//!
//! Uniqueness is not checked here. The service decides when an index
//! entry is written or removed because only it sees both the old and the
//! new name of a label.

use std::sync::Arc;

use crate::error::CoreError;
use crate::id::{Id, IdGenerator};
use crate::index::index_key;
use crate::kv::{StoreError, Tx};

use super::types::{Label, LabelFilter};

pub struct LabelStore {
    label_bucket: String,
    index_bucket: String,
    ids: Arc<dyn IdGenerator>,
    max_id_attempts: usize,
}

impl LabelStore {
    pub fn new(
        label_bucket: impl Into<String>,
        index_bucket: impl Into<String>,
        ids: Arc<dyn IdGenerator>,
        max_id_attempts: usize,
    ) -> Self {
        Self {
            label_bucket: label_bucket.into(),
            index_bucket: index_bucket.into(),
            ids,
            max_id_attempts,
        }
    }

    pub fn label_bucket(&self) -> &str {
        &self.label_bucket
    }

    pub fn index_bucket(&self) -> &str {
        &self.index_bucket
    }

    // ========================================================================
    // Primary records
    // ========================================================================

    /// Assign a fresh id to `label` and write its primary record.
    pub fn create_label(&self, tx: &mut dyn Tx, label: &mut Label) -> Result<(), CoreError> {
        label.id = self.free_id(tx)?;
        self.put_label(tx, label)
    }

    pub fn get_label(&self, tx: &mut dyn Tx, id: Id) -> Result<Label, CoreError> {
        let key = id.encode()?;
        let bucket = tx
            .bucket(&self.label_bucket)
            .map_err(CoreError::store("open label bucket"))?;
        let raw = match bucket.get(&key) {
            Ok(raw) => raw,
            Err(StoreError::KeyNotFound) => return Err(CoreError::LabelNotFound(id)),
            Err(err) => return Err(CoreError::store("read label")(err)),
        };
        decode_label(&raw)
    }

    /// Every label matching `filter`, in primary-key order.
    pub fn list_labels(
        &self,
        tx: &mut dyn Tx,
        filter: &LabelFilter,
    ) -> Result<Vec<Label>, CoreError> {
        let entries = tx
            .bucket(&self.label_bucket)
            .map_err(CoreError::store("open label bucket"))?
            .scan_prefix(&[])
            .map_err(CoreError::store("scan labels"))?;

        let mut labels = Vec::new();
        for (_, raw) in &entries {
            let label = decode_label(raw)?;
            if filter.matches(&label) {
                labels.push(label);
            }
        }
        Ok(labels)
    }

    /// Overwrite the primary record at `label.id`. The index is untouched.
    pub fn update_label(&self, tx: &mut dyn Tx, label: &Label) -> Result<(), CoreError> {
        self.put_label(tx, label)
    }

    /// Remove the primary record. The index entry and mappings stay.
    pub fn delete_label(&self, tx: &mut dyn Tx, id: Id) -> Result<(), CoreError> {
        let key = id.encode()?;
        tx.bucket(&self.label_bucket)
            .map_err(CoreError::store("open label bucket"))?
            .delete(&key)
            .map_err(CoreError::store("delete label"))
    }

    // ========================================================================
    // Index entries
    // ========================================================================

    /// Claim `orgID:name` for `label`.
    pub fn put_index_entry(&self, tx: &mut dyn Tx, label: &Label) -> Result<(), CoreError> {
        let key = index_key(label.org_id, &label.name)?;
        let id = label.id.encode()?;
        tx.bucket(&self.index_bucket)
            .map_err(|source| self.unexpected_index(source))?
            .put(&key, &id)
            .map_err(|source| self.unexpected_index(source))
    }

    /// Release `orgID:name` as currently recorded on `label`.
    pub fn delete_index_entry(&self, tx: &mut dyn Tx, label: &Label) -> Result<(), CoreError> {
        let key = index_key(label.org_id, &label.name)?;
        tx.bucket(&self.index_bucket)
            .map_err(|source| self.unexpected_index(source))?
            .delete(&key)
            .map_err(|source| self.unexpected_index(source))
    }

    /// Resolve a label through the index. `None` when no label holds the name.
    pub fn find_by_name(
        &self,
        tx: &mut dyn Tx,
        org_id: Id,
        name: &str,
    ) -> Result<Option<Label>, CoreError> {
        let key = index_key(org_id, name)?;
        let raw_id = {
            let bucket = tx
                .bucket(&self.index_bucket)
                .map_err(|source| self.unexpected_index(source))?;
            match bucket.get(&key) {
                Ok(raw) => raw,
                Err(StoreError::KeyNotFound) => return Ok(None),
                Err(source) => return Err(self.unexpected_index(source)),
            }
        };

        let id = Id::decode(&raw_id)?;
        match self.get_label(tx, id) {
            Ok(label) => Ok(Some(label)),
            Err(CoreError::LabelNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn put_label(&self, tx: &mut dyn Tx, label: &Label) -> Result<(), CoreError> {
        let key = label.id.encode()?;
        let value = serde_json::to_vec(label).map_err(|source| CoreError::Codec {
            entity: "label",
            source,
        })?;
        tx.bucket(&self.label_bucket)
            .map_err(CoreError::store("open label bucket"))?
            .put(&key, &value)
            .map_err(CoreError::store("write label"))
    }

    /// Draw ids until one is valid and unused in the primary bucket.
    fn free_id(&self, tx: &mut dyn Tx) -> Result<Id, CoreError> {
        let bucket = tx
            .bucket(&self.label_bucket)
            .map_err(CoreError::store("open label bucket"))?;

        for _ in 0..self.max_id_attempts {
            let id = self.ids.id();
            let Ok(key) = id.encode() else {
                continue;
            };
            match bucket.get(&key) {
                Err(StoreError::KeyNotFound) => return Ok(id),
                Ok(_) => continue,
                Err(err) => return Err(CoreError::store("probe label id")(err)),
            }
        }

        Err(CoreError::IdGeneration {
            attempts: self.max_id_attempts,
        })
    }

    fn unexpected_index(&self, source: StoreError) -> CoreError {
        CoreError::UnexpectedIndex {
            index: self.index_bucket.clone(),
            source,
        }
    }
}

pub(super) fn decode_label(raw: &[u8]) -> Result<Label, CoreError> {
    serde_json::from_slice(raw).map_err(|source| CoreError::Codec {
        entity: "label",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryStore, Store};
    use crate::test_util::{label_store, memory_store, SequentialIds};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn create_assigns_an_id_and_get_reads_it_back() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let created = store
            .update(&cancel, |tx| {
                let mut label = Label::new(Id::new(10), "prod").with_property("color", "red");
                labels.create_label(tx, &mut label)?;
                Ok(label)
            })
            .await
            .unwrap();
        assert!(created.id.is_valid());

        let fetched = store
            .view(&cancel, |tx| labels.get_label(tx, created.id))
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_skips_ids_already_in_use() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let taken = Label {
            id: Id::new(1),
            ..Label::new(Id::new(10), "taken")
        };
        store
            .update(&cancel, |tx| labels.update_label(tx, &taken))
            .await
            .unwrap();

        let fresh = store
            .update(&cancel, |tx| {
                let mut label = Label::new(Id::new(10), "fresh");
                labels.create_label(tx, &mut label)?;
                Ok(label.id)
            })
            .await
            .unwrap();
        assert_eq!(fresh, Id::new(2));
    }

    #[tokio::test]
    async fn create_gives_up_after_configured_attempts() {
        let store = memory_store();
        let labels = LabelStore::new("labelsv1", "labelindexv1", Arc::new(SequentialIds::stuck()), 3);
        let cancel = CancellationToken::new();

        let result = store
            .update(&cancel, |tx| {
                let mut label = Label::new(Id::new(10), "never");
                labels.create_label(tx, &mut label)
            })
            .await;
        assert!(matches!(
            result,
            Err(CoreError::IdGeneration { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn get_missing_label_is_not_found() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let result = store
            .view(&cancel, |tx| labels.get_label(tx, Id::new(77)))
            .await;
        assert!(matches!(result, Err(CoreError::LabelNotFound(id)) if id == Id::new(77)));
    }

    #[tokio::test]
    async fn list_filters_by_org_and_name() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        store
            .update(&cancel, |tx| {
                for (org, name) in [(1, "a"), (1, "b"), (2, "a")] {
                    let mut label = Label::new(Id::new(org), name);
                    labels.create_label(tx, &mut label)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let by_org = store
            .view(&cancel, |tx| {
                labels.list_labels(
                    tx,
                    &LabelFilter {
                        org_id: Some(Id::new(1)),
                        name: None,
                    },
                )
            })
            .await
            .unwrap();
        assert_eq!(by_org.len(), 2);

        let by_name = store
            .view(&cancel, |tx| {
                labels.list_labels(
                    tx,
                    &LabelFilter {
                        org_id: None,
                        name: Some("a".into()),
                    },
                )
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 2);
        assert!(by_name.iter().all(|l| l.name == "a"));
    }

    #[tokio::test]
    async fn index_entries_resolve_by_name_until_deleted() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let label = store
            .update(&cancel, |tx| {
                let mut label = Label::new(Id::new(3), "ops");
                labels.create_label(tx, &mut label)?;
                labels.put_index_entry(tx, &label)?;
                Ok(label)
            })
            .await
            .unwrap();

        let found = store
            .view(&cancel, |tx| labels.find_by_name(tx, Id::new(3), "ops"))
            .await
            .unwrap();
        assert_eq!(found, Some(label.clone()));

        store
            .update(&cancel, |tx| labels.delete_index_entry(tx, &label))
            .await
            .unwrap();
        let gone = store
            .view(&cancel, |tx| labels.find_by_name(tx, Id::new(3), "ops"))
            .await
            .unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn delete_removes_only_the_primary_record() {
        let store = memory_store();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let label = store
            .update(&cancel, |tx| {
                let mut label = Label::new(Id::new(3), "ops");
                labels.create_label(tx, &mut label)?;
                labels.put_index_entry(tx, &label)?;
                labels.delete_label(tx, label.id)?;
                Ok(label)
            })
            .await
            .unwrap();

        let (primary, index) = store
            .view(&cancel, |tx| {
                let primary = labels.get_label(tx, label.id);
                let key = index_key(label.org_id, &label.name)?;
                let index = tx.bucket(labels.index_bucket())?.get(&key);
                Ok((primary.is_err(), index.is_ok()))
            })
            .await
            .unwrap();
        assert!(primary);
        assert!(index);
    }

    #[tokio::test]
    async fn missing_label_bucket_is_a_store_error() {
        let store = MemoryStore::new();
        let labels = label_store();
        let cancel = CancellationToken::new();

        let result = store
            .view(&cancel, |tx| labels.list_labels(tx, &LabelFilter::default()))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Store {
                source: StoreError::BucketNotFound(_),
                ..
            })
        ));
    }
}
