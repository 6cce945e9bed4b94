//! Transfer-plan compiler
//!
//! Turns a configuration document into the compiled plan a session runs
//! from: the node role, the receive wait bound, the sender pipeline
//! template and the table of named transfer items. Validation is eager
//! and fail-fast; a rejected document leaves no partial plan behind.

use crate::config::{OffloadConfig, TransferValue};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Default receive wait bound applied when `time-limit` is absent
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(10);

/// Declared role of a node in an offloading exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// Owns the untrained data and issues transfer requests
    Sender,

    /// Accepts transferred data, trains, and replies with the model
    Receiver,
}

impl Role {
    /// Parse a role from its configuration spelling, case-insensitively
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("sender") {
            Ok(Role::Sender)
        } else if value.eq_ignore_ascii_case("receiver") {
            Ok(Role::Receiver)
        } else {
            Err(Error::InvalidConfig {
                message: format!("unrecognized node-type '{value}'"),
            })
        }
    }
}

/// A single compiled transfer item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferItem {
    /// Path of a file whose bytes travel under the item's name
    File(String),

    /// Inlined pipeline-description template, sent as text after every
    /// file item so its arrival signals receive-completeness
    PipelineTemplate(String),
}

impl TransferItem {
    /// The textual value carried by this item
    pub fn as_str(&self) -> &str {
        match self {
            TransferItem::File(path) => path,
            TransferItem::PipelineTemplate(template) => template,
        }
    }
}

/// Compiled transfer plan for one offloading session
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Role this node plays
    pub role: Role,

    /// Bound on the receive-completeness wait
    pub time_limit: Duration,

    /// Sender-side pipeline template; always present for a sender
    pub sender_pipeline: Option<String>,

    /// Named transfer items; non-empty after successful compilation
    pub items: BTreeMap<String, TransferItem>,

    /// Provisional trained-model path (receiver only); rewritten against
    /// the app-writable root before first use
    pub trained_model: Option<String>,
}

impl TransferPlan {
    /// Compile a configuration document into a transfer plan
    ///
    /// Any violation rejects the whole document; no partially-populated
    /// plan is ever returned.
    pub fn compile(document: &serde_json::Value) -> Result<Self> {
        let config: OffloadConfig =
            serde_json::from_value(document.clone()).map_err(|e| Error::InvalidConfig {
                message: format!("malformed offloading configuration: {e}"),
            })?;

        let role = Role::parse(&config.node_type)?;

        let time_limit = match config.training.time_limit {
            Some(seconds) if seconds > 0 => Duration::from_secs(seconds as u64),
            Some(seconds) => {
                return Err(Error::InvalidConfig {
                    message: format!("time-limit must be a positive integer, got {seconds}"),
                });
            }
            None => {
                warn!(
                    default_secs = DEFAULT_TIME_LIMIT.as_secs(),
                    "time-limit not set, using default"
                );
                DEFAULT_TIME_LIMIT
            }
        };

        let sender_pipeline = match config.training.sender_pipeline {
            Some(pipe) if !pipe.is_empty() => Some(pipe),
            Some(_) => {
                return Err(Error::InvalidConfig {
                    message: "sender-pipeline must not be empty".to_string(),
                });
            }
            None if role == Role::Sender => {
                return Err(Error::InvalidConfig {
                    message: "sender-pipeline is required for a sender node".to_string(),
                });
            }
            None => None,
        };

        let table = config
            .training
            .transfer_data
            .ok_or_else(|| Error::InvalidConfig {
                message: "transfer-data table is required".to_string(),
            })?;
        if table.is_empty() {
            return Err(Error::InvalidConfig {
                message: "transfer-data table must not be empty".to_string(),
            });
        }

        let mut items = BTreeMap::new();
        let mut last_value = None;

        for (key, value) in table {
            if key.is_empty() {
                return Err(Error::InvalidConfig {
                    message: "transfer-data keys must be non-empty strings".to_string(),
                });
            }

            let item = match value {
                TransferValue::Text(path) => {
                    if path.is_empty() {
                        return Err(Error::InvalidConfig {
                            message: format!("transfer-data entry '{key}' has an empty value"),
                        });
                    }
                    TransferItem::File(path)
                }
                TransferValue::Nested(node) => {
                    let template = serde_json::to_string_pretty(&node)?;
                    if !template.contains("pipeline") {
                        return Err(Error::InvalidConfig {
                            message: format!(
                                "transfer-data entry '{key}' is neither a file path nor a pipeline template"
                            ),
                        });
                    }
                    TransferItem::PipelineTemplate(template)
                }
            };

            last_value = Some(item.as_str().to_string());
            items.insert(key, item);
        }

        // Only the trained model travels back today, so a receiver's table
        // holds a single entry and its value is the model destination.
        let trained_model = match role {
            Role::Receiver => last_value,
            Role::Sender => None,
        };

        Ok(Self {
            role,
            time_limit,
            sender_pipeline,
            items,
            trained_model,
        })
    }
}
