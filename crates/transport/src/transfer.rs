//! Transfer seam definition
//!
//! Payloads travel under a caller-chosen name and carry a kind tag so the
//! receiving service can route them without inspecting the bytes: plain
//! transfer files are persisted by the embedding service, pipeline
//! descriptors and replies are handed to the offloading session.

use async_trait::async_trait;
use bytes::Bytes;
use offload_core::Result;

/// Kind tag carried with every transferred payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    /// Bytes of a transfer-data file; persisted by the receiving service
    File,

    /// Pipeline-description text; sent after every file so its arrival
    /// signals receive-completeness
    PipelineDescriptor,

    /// Reply payload carrying the trained model, tagged with the file
    /// name the sender should store it under
    Reply { file_name: String },
}

/// A payload delivered by the remote peer
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Name the payload was requested under
    pub name: String,

    /// Payload bytes
    pub data: Bytes,

    /// Kind tag assigned by the sending side
    pub kind: TransferKind,
}

/// Async trait for delivering named payloads to the remote peer
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `data` to the remote peer under `name`
    ///
    /// # Errors
    /// Returns error if the peer is unreachable or delivery fails
    async fn request(&self, name: &str, data: Bytes, kind: TransferKind) -> Result<()>;
}
