//! In-process pipeline engine
//!
//! Executes no media; it parses `name=<ident>` element declarations out of
//! a launch description and resolves element/sink lookups against them.
//! Good enough for tests and for embedders that only need the offloading
//! control surface.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use offload_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::handle::{ElementHandle, PipelineHandle, SinkEvent, SinkHandle};
use crate::runtime::PipelineRuntime;

/// Lifecycle state of an in-process pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed but not yet started
    Constructed,

    /// Started and accepting sink traffic
    Running,

    /// Stopped after running
    Stopped,
}

struct PipelineEntry {
    description: String,
    state: PipelineState,
    elements: HashMap<String, ElementHandle>,
    sinks: HashMap<String, RegisteredSink>,
}

struct RegisteredSink {
    handle: SinkHandle,
    events: mpsc::Sender<SinkEvent>,
}

/// In-process pipeline engine
///
/// Pipelines live in an internal arena keyed by handle; handles from one
/// runtime instance are meaningless to another.
#[derive(Default)]
pub struct InProcessRuntime {
    pipelines: DashMap<PipelineHandle, PipelineEntry>,
}

impl InProcessRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a pipeline, if it exists
    pub fn state(&self, pipeline: &PipelineHandle) -> Option<PipelineState> {
        self.pipelines.get(pipeline).map(|entry| entry.state)
    }

    /// Description a pipeline was constructed from, if it exists
    pub fn description(&self, pipeline: &PipelineHandle) -> Option<String> {
        self.pipelines
            .get(pipeline)
            .map(|entry| entry.description.clone())
    }

    /// Push data through a registered sink, as the element would
    ///
    /// # Errors
    /// Returns error if the pipeline is not running or no sink is
    /// registered under `name`
    pub async fn emit_sink_data(
        &self,
        pipeline: &PipelineHandle,
        name: &str,
        data: Bytes,
    ) -> Result<()> {
        let events = {
            let entry = self
                .pipelines
                .get(pipeline)
                .ok_or_else(|| Error::PipelineNotFound {
                    pipeline: pipeline.to_string(),
                })?;

            if entry.state != PipelineState::Running {
                return Err(Error::InvalidState {
                    operation: "emit_sink_data".to_string(),
                    reason: "pipeline is not running".to_string(),
                });
            }

            entry
                .sinks
                .get(name)
                .map(|sink| sink.events.clone())
                .ok_or_else(|| Error::ElementNotFound {
                    element: name.to_string(),
                })?
        };

        events
            .send(SinkEvent {
                node: name.to_string(),
                data,
            })
            .await
            .map_err(|_| Error::ChannelClosed {
                channel: format!("sink '{name}'"),
            })
    }

    /// Extract `name=<ident>` declarations from a launch description
    fn parse_element_names(description: &str) -> HashMap<String, ElementHandle> {
        description
            .split_whitespace()
            .filter_map(|token| token.strip_prefix("name="))
            .filter(|name| !name.is_empty())
            .map(|name| (name.to_string(), ElementHandle::new()))
            .collect()
    }
}

#[async_trait]
impl PipelineRuntime for InProcessRuntime {
    #[instrument(skip(self, description), fields(engine = "in-process"))]
    async fn construct(&self, description: &str) -> Result<PipelineHandle> {
        if description.trim().is_empty() {
            return Err(Error::InvalidParameter {
                message: "pipeline description must not be empty".to_string(),
            });
        }

        let handle = PipelineHandle::new();
        let elements = Self::parse_element_names(description);
        debug!(%handle, elements = elements.len(), "Pipeline constructed");

        self.pipelines.insert(
            handle,
            PipelineEntry {
                description: description.to_string(),
                state: PipelineState::Constructed,
                elements,
                sinks: HashMap::new(),
            },
        );

        Ok(handle)
    }

    #[instrument(skip(self), fields(engine = "in-process"))]
    async fn start(&self, pipeline: &PipelineHandle) -> Result<()> {
        let mut entry = self
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| Error::PipelineNotFound {
                pipeline: pipeline.to_string(),
            })?;

        entry.state = PipelineState::Running;
        debug!(%pipeline, "Pipeline started");
        Ok(())
    }

    #[instrument(skip(self), fields(engine = "in-process"))]
    async fn stop(&self, pipeline: &PipelineHandle) -> Result<()> {
        let mut entry = self
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| Error::PipelineNotFound {
                pipeline: pipeline.to_string(),
            })?;

        entry.state = PipelineState::Stopped;
        debug!(%pipeline, "Pipeline stopped");
        Ok(())
    }

    #[instrument(skip(self), fields(engine = "in-process"))]
    async fn destroy(&self, pipeline: &PipelineHandle) -> Result<()> {
        self.pipelines
            .remove(pipeline)
            .map(|_| debug!(%pipeline, "Pipeline destroyed"))
            .ok_or_else(|| Error::PipelineNotFound {
                pipeline: pipeline.to_string(),
            })
    }

    #[instrument(skip(self), fields(engine = "in-process"))]
    async fn element(&self, pipeline: &PipelineHandle, name: &str) -> Result<ElementHandle> {
        let entry = self
            .pipelines
            .get(pipeline)
            .ok_or_else(|| Error::PipelineNotFound {
                pipeline: pipeline.to_string(),
            })?;

        entry
            .elements
            .get(name)
            .copied()
            .ok_or_else(|| Error::ElementNotFound {
                element: name.to_string(),
            })
    }

    #[instrument(skip(self, events), fields(engine = "in-process"))]
    async fn register_sink(
        &self,
        pipeline: &PipelineHandle,
        name: &str,
        events: mpsc::Sender<SinkEvent>,
    ) -> Result<SinkHandle> {
        let mut entry = self
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| Error::PipelineNotFound {
                pipeline: pipeline.to_string(),
            })?;

        if !entry.elements.contains_key(name) {
            return Err(Error::ElementNotFound {
                element: name.to_string(),
            });
        }
        if entry.sinks.contains_key(name) {
            return Err(Error::SinkAlreadyRegistered {
                element: name.to_string(),
            });
        }

        let handle = SinkHandle::new();
        entry
            .sinks
            .insert(name.to_string(), RegisteredSink { handle, events });

        debug!(%pipeline, element = name, "Sink registered");
        Ok(handle)
    }
}
