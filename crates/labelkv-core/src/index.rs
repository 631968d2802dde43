//! Scoped-uniqueness indexes.
//!
//! An index bucket maps a key encoding a uniqueness scope to the id of the
//! entity that claims it. Presence of the key means the scope is taken;
//! the stored value is never inspected when checking.

use crate::error::CoreError;
use crate::id::{Id, ID_LENGTH};
use crate::kv::{StoreError, Tx};

const SCOPE_SEPARATOR: u8 = b':';

/// Composite `orgID:name` key. The org id is fixed-width, so distinct
/// pairs never collide. Fails only when `org_id` cannot be encoded.
pub fn index_key(org_id: Id, name: &str) -> Result<Vec<u8>, CoreError> {
    let org = org_id.encode()?;
    let mut key = Vec::with_capacity(ID_LENGTH + 1 + name.len());
    key.extend_from_slice(&org);
    key.push(SCOPE_SEPARATOR);
    key.extend_from_slice(name.as_bytes());
    Ok(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    Unique,
    NotUnique,
}

/// Point lookup of `key` in `index_bucket`.
///
/// Anything other than a clean hit or a clean miss is reported as
/// [`CoreError::UnexpectedIndex`] naming the index.
pub fn check_unique(
    tx: &mut dyn Tx,
    index_bucket: &str,
    key: &[u8],
) -> Result<Uniqueness, CoreError> {
    let unexpected = |source| CoreError::UnexpectedIndex {
        index: index_bucket.to_string(),
        source,
    };

    let bucket = tx.bucket(index_bucket).map_err(unexpected)?;
    match bucket.get(key) {
        Err(StoreError::KeyNotFound) => Ok(Uniqueness::Unique),
        Ok(_) => Ok(Uniqueness::NotUnique),
        Err(err) => Err(unexpected(err)),
    }
}
