//! Offloading configuration schema
//!
//! The configuration document arrives as an untyped JSON tree from the
//! embedding service. It is deserialized into this schema and validated
//! eagerly by the transfer-plan compiler; nothing here is consulted after
//! compilation succeeds.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level offloading configuration document
///
/// ```json
/// {
///   "node-type": "sender" | "receiver",
///   "training": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct OffloadConfig {
    /// Declared role of this node; matched case-insensitively
    #[serde(rename = "node-type")]
    pub node_type: String,

    /// Training-specific settings
    pub training: TrainingSection,
}

/// The `training` section of the configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingSection {
    /// Receive wait bound in seconds; defaults to 10 when absent
    #[serde(rename = "time-limit")]
    pub time_limit: Option<i64>,

    /// Pipeline description run on the sender side
    #[serde(rename = "sender-pipeline")]
    pub sender_pipeline: Option<String>,

    /// Named items to transfer to the remote peer
    #[serde(rename = "transfer-data")]
    pub transfer_data: Option<BTreeMap<String, TransferValue>>,
}

/// A single `transfer-data` entry value: either a file path or a nested
/// pipeline-description object that is re-serialized and sent as text
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TransferValue {
    /// Plain string, interpreted as a file path
    Text(String),

    /// Nested structure, interpreted as an inlined pipeline template
    Nested(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_roundtrip() {
        let doc = json!({
            "node-type": "sender",
            "training": {
                "time-limit": 30,
                "sender-pipeline": "datareposrc ! edgesink",
                "transfer-data": {
                    "data": "@APP_RW_PATH@/train.dat",
                    "pipe": { "pipeline": { "description": "edgesrc ! trainsink" } }
                }
            }
        });

        let config: OffloadConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.node_type, "sender");
        assert_eq!(config.training.time_limit, Some(30));

        let table = config.training.transfer_data.unwrap();
        assert!(matches!(table.get("data"), Some(TransferValue::Text(_))));
        assert!(matches!(table.get("pipe"), Some(TransferValue::Nested(_))));
    }

    #[test]
    fn test_missing_training_section_rejected() {
        let doc = json!({ "node-type": "receiver" });
        assert!(serde_json::from_value::<OffloadConfig>(doc).is_err());
    }
}
