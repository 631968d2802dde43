//! Label and label-mapping entities, query filters, and field validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::Id;

// ==============================================================================
// Resource Types
// ==============================================================================

/// The category of resource a label can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Authorizations,
    Buckets,
    Checks,
    Dashboards,
    Documents,
    Labels,
    NotificationEndpoints,
    NotificationRules,
    Orgs,
    Scrapers,
    Secrets,
    Sources,
    Tasks,
    Telegrafs,
    Users,
    Variables,
    Views,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authorizations => "authorizations",
            Self::Buckets => "buckets",
            Self::Checks => "checks",
            Self::Dashboards => "dashboards",
            Self::Documents => "documents",
            Self::Labels => "labels",
            Self::NotificationEndpoints => "notificationendpoints",
            Self::NotificationRules => "notificationrules",
            Self::Orgs => "orgs",
            Self::Scrapers => "scrapers",
            Self::Secrets => "secrets",
            Self::Sources => "sources",
            Self::Tasks => "tasks",
            Self::Telegrafs => "telegrafs",
            Self::Users => "users",
            Self::Variables => "variables",
            Self::Views => "views",
        };
        f.write_str(name)
    }
}

// ==============================================================================
// Labels
// ==============================================================================

/// An organization-scoped named tag with optional key/value properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: Id,
    #[serde(rename = "orgID")]
    pub org_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl Label {
    /// A label not yet persisted; its id is assigned on creation.
    pub fn new(org_id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Id::default(),
            org_id,
            name: name.into(),
            properties: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.org_id.is_valid() {
            return Err(ValidationError::MissingOrgId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    /// Apply property deltas: an empty value removes the key, anything else
    /// sets it. A label without properties gains an empty map first when
    /// there is at least one delta.
    pub(crate) fn apply_property_deltas(&mut self, deltas: &BTreeMap<String, String>) {
        if deltas.is_empty() {
            return;
        }
        let properties = self.properties.get_or_insert_with(BTreeMap::new);
        for (key, value) in deltas {
            if value.is_empty() {
                properties.remove(key);
            } else {
                properties.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Changes to apply to an existing label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelUpdate {
    /// New name; `None` or empty leaves the name unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Property deltas; an empty value deletes the key.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl LabelUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Matches labels by organization and/or exact name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    pub org_id: Option<Id>,
    pub name: Option<String>,
}

impl LabelFilter {
    pub(crate) fn matches(&self, label: &Label) -> bool {
        self.org_id.is_none_or(|org_id| label.org_id == org_id)
            && self.name.as_deref().is_none_or(|name| label.name == name)
    }
}

/// Pagination applied after filtering, over primary-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub offset: usize,
    pub limit: Option<usize>,
    pub descending: bool,
}

impl FindOptions {
    pub(crate) fn apply(&self, mut labels: Vec<Label>) -> Vec<Label> {
        if self.descending {
            labels.reverse();
        }
        labels
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

// ==============================================================================
// Label Mappings
// ==============================================================================

/// Records that a label has been applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelMapping {
    #[serde(rename = "resourceID")]
    pub resource_id: Id,
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceType,
    #[serde(rename = "labelID")]
    pub label_id: Id,
}

impl LabelMapping {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.label_id.is_valid() {
            return Err(ValidationError::MissingLabelId);
        }
        if !self.resource_id.is_valid() {
            return Err(ValidationError::MissingResourceId);
        }
        Ok(())
    }
}

/// Selects the labels applied to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMappingFilter {
    pub resource_id: Id,
    pub resource_type: ResourceType,
    /// Restrict to a single label.
    pub label_id: Option<Id>,
}

impl LabelMappingFilter {
    pub fn for_resource(resource_id: Id, resource_type: ResourceType) -> Self {
        Self {
            resource_id,
            resource_type,
            label_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.resource_id.is_valid() {
            return Err(ValidationError::MissingResourceId);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("organization id is required")]
    MissingOrgId,

    #[error("label name is required")]
    EmptyName,

    #[error("label id is required")]
    MissingLabelId,

    #[error("resource id is required")]
    MissingResourceId,
}
