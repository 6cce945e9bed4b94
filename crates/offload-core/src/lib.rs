//! Offload Core - Foundation for the training offloading runtime
//!
//! Provides the error taxonomy, the configuration schema, the
//! transfer-plan compiler and the path-template rewriter shared by the
//! session orchestrator and the collaborator seams.

pub mod config;
pub mod error;
pub mod paths;
pub mod plan;

pub use config::{OffloadConfig, TrainingSection, TransferValue};
pub use error::{Error, Result};
pub use plan::{Role, TransferItem, TransferPlan, DEFAULT_TIME_LIMIT};
