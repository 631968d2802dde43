use serde::{Deserialize, Serialize};

/// Storage layout and tuning for the label service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelServiceConfig {
    /// Primary label records, keyed by encoded label id.
    pub label_bucket: String,
    /// Label-to-resource associations, keyed by resource id then label id.
    pub mapping_bucket: String,
    /// Uniqueness index, keyed by `orgID:name`.
    pub index_bucket: String,
    /// How many generated ids to try before giving up on a free one.
    pub max_id_attempts: usize,
}

impl Default for LabelServiceConfig {
    fn default() -> Self {
        Self {
            label_bucket: "labelsv1".to_string(),
            mapping_bucket: "labelmappingsv1".to_string(),
            index_bucket: "labelindexv1".to_string(),
            max_id_attempts: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: LabelServiceConfig =
            serde_json::from_str(r#"{"index_bucket":"custom-index"}"#).unwrap();
        assert_eq!(config.index_bucket, "custom-index");
        assert_eq!(config.label_bucket, "labelsv1");
        assert_eq!(config.max_id_attempts, 100);
    }
}
