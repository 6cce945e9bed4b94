//! Pipeline runtime trait definition
//!
//! Defines the async interface a session drives a pipeline engine
//! through. Implementations own every pipeline they construct; callers
//! only hold typed handles.

use async_trait::async_trait;
use offload_core::Result;
use tokio::sync::mpsc;

use crate::handle::{ElementHandle, PipelineHandle, SinkEvent, SinkHandle};

/// Async trait for pipeline engines
///
/// Implementors construct data-flow pipelines from a textual launch
/// description and expose named element and sink lookups on them.
#[async_trait]
pub trait PipelineRuntime: Send + Sync {
    /// Construct a pipeline from a launch description
    ///
    /// # Arguments
    /// * `description` - Launch-style pipeline text, fully rewritten
    ///   (no placeholder tokens)
    ///
    /// # Errors
    /// Returns error if the description is empty or cannot be parsed
    async fn construct(&self, description: &str) -> Result<PipelineHandle>;

    /// Start a constructed pipeline
    async fn start(&self, pipeline: &PipelineHandle) -> Result<()>;

    /// Stop a running pipeline; the pipeline stays constructed
    async fn stop(&self, pipeline: &PipelineHandle) -> Result<()>;

    /// Destroy a pipeline and release every element and sink it owns
    ///
    /// The handle is invalid afterwards. Must be called exactly once per
    /// constructed pipeline.
    async fn destroy(&self, pipeline: &PipelineHandle) -> Result<()>;

    /// Look up a named element inside a constructed pipeline
    ///
    /// # Errors
    /// Returns error if the pipeline does not expose an element of that
    /// name
    async fn element(&self, pipeline: &PipelineHandle, name: &str) -> Result<ElementHandle>;

    /// Register a sink on a named element
    ///
    /// Data the element emits is delivered as [`SinkEvent`]s tagged with
    /// `name`, dispatched by identifier rather than captured context.
    async fn register_sink(
        &self,
        pipeline: &PipelineHandle,
        name: &str,
        events: mpsc::Sender<SinkEvent>,
    ) -> Result<SinkHandle>;
}
