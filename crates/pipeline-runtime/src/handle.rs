//! Typed resource identifiers handed out by a pipeline runtime
//!
//! Handles are opaque capability tokens owned by the session that obtained
//! them. They carry no runtime state themselves; every operation resolves
//! them through the runtime that issued them.

use bytes::Bytes;
use std::fmt;
use uuid::Uuid;

/// Identifier of a constructed pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(Uuid);

/// Identifier of a named element inside a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(Uuid);

/// Identifier of a registered sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(Uuid);

impl PipelineHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl ElementHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl SinkHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline-{}", self.0)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element-{}", self.0)
    }
}

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Data emitted by a registered sink, tagged with the node name it was
/// registered under so receivers can dispatch by identifier
#[derive(Debug, Clone)]
pub struct SinkEvent {
    /// Name the sink was registered under
    pub node: String,

    /// Payload emitted by the pipeline
    pub data: Bytes,
}
