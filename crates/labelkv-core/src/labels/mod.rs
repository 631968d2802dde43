//! Organization-scoped labels and their mappings onto resources.
//!
//! [`LabelService`] is the public contract. [`LabelStore`] and
//! [`MappingStore`] are the per-transaction primitives it composes, and
//! [`OwnershipRegistry`] is the hook used to record label ownership.

mod mapping;
mod ownership;
mod service;
mod store;
mod types;

pub use mapping::MappingStore;
pub use ownership::{BucketOwnership, OwnershipRecord, OwnershipRegistry};
pub use service::{LabelService, LabelServiceBuilder};
pub use store::LabelStore;
pub use types::{
    FindOptions, Label, LabelFilter, LabelMapping, LabelMappingFilter, LabelUpdate, ResourceType,
    ValidationError,
};
