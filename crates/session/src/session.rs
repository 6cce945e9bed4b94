//! Offloading session orchestrator
//!
//! One session per offloading exchange. The caller drives the lifecycle
//! `Created → Configured → Preparing → Running → Stopped → Destroyed`;
//! the transport's delivery task feeds inbound payloads in through a
//! cloneable [`InboundHandle`], and a receiver's `start` blocks on the
//! receive-completeness monitor before constructing the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use offload_core::{paths, Error, Result, Role, TransferItem, TransferPlan};
use pipeline_runtime::{PipelineHandle, PipelineRuntime, SinkEvent};
use transport::{Inbound, Transport, TransferKind};

use crate::monitor::{ReceiveMonitor, ReceiveState};
use crate::nodes::{NodeInfo, NodeKind, NodeRegistry};

const SINK_QUEUE_DEPTH: usize = 64;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Configured,
    Preparing,
    Running,
    Stopped,
    Destroyed,
}

/// Session fields written by the transport's delivery task and read by
/// the monitor and the orchestrator. Single writer per field; everything
/// behind its own lock.
#[derive(Default)]
pub(crate) struct SessionShared {
    base_path: Mutex<Option<PathBuf>>,
    received_descriptor: Mutex<Option<String>>,
    trained_model_path: Mutex<Option<String>>,
}

impl SessionShared {
    pub(crate) fn base_path(&self) -> Option<PathBuf> {
        self.base_path.lock().clone()
    }

    pub(crate) fn set_base_path(&self, path: PathBuf) {
        *self.base_path.lock() = Some(path);
    }

    pub(crate) fn descriptor_arrived(&self) -> bool {
        self.received_descriptor.lock().is_some()
    }

    pub(crate) fn set_received_descriptor(&self, text: String) {
        *self.received_descriptor.lock() = Some(text);
    }

    pub(crate) fn trained_model_path(&self) -> Option<String> {
        self.trained_model_path.lock().clone()
    }

    pub(crate) fn set_trained_model(&self, path: String) {
        *self.trained_model_path.lock() = Some(path);
    }

    /// Resolve the app-root token in the trained-model path and store the
    /// result. Runs before the descriptor rewrite, whose trained-model
    /// token expands to the value produced here.
    fn rewrite_trained_model(&self, base: &str) -> Option<String> {
        let mut slot = self.trained_model_path.lock();
        let resolved = paths::substitute(slot.as_deref()?, paths::APP_RW_PATH, base);
        *slot = Some(resolved.clone());
        Some(resolved)
    }

    fn rewrite_descriptor(&self, base: &str, trained_model: &str) -> Option<String> {
        let mut slot = self.received_descriptor.lock();
        let text = paths::substitute(slot.as_deref()?, paths::REMOTE_APP_RW_PATH, base);
        let text = paths::substitute(&text, paths::TRAINED_MODEL_FILE, trained_model);
        *slot = Some(text.clone());
        Some(text)
    }

    fn clear(&self) {
        *self.base_path.lock() = None;
        *self.received_descriptor.lock() = None;
        *self.trained_model_path.lock() = None;
    }
}

/// Cloneable handle the transport's delivery task feeds payloads through
#[derive(Clone)]
pub struct InboundHandle {
    role: Role,
    shared: Arc<SessionShared>,
}

impl InboundHandle {
    /// Consume one inbound payload
    ///
    /// A receiver stores the pipeline descriptor for the monitor to pick
    /// up; a sender derives its local trained-model path from a reply's
    /// file name. Payload kinds the embedding service persists itself
    /// (plain transfer files) are ignored here.
    pub fn process(&self, inbound: Inbound) -> Result<()> {
        match (self.role, inbound.kind) {
            (Role::Receiver, TransferKind::PipelineDescriptor) => {
                let text =
                    String::from_utf8(inbound.data.to_vec()).map_err(|_| Error::InvalidParameter {
                        message: format!("pipeline descriptor '{}' is not valid UTF-8", inbound.name),
                    })?;
                debug!(name = %inbound.name, "Received pipeline descriptor");
                self.shared.set_received_descriptor(text);
                Ok(())
            }
            (Role::Sender, TransferKind::Reply { file_name }) => {
                let base = self.shared.base_path().ok_or_else(|| Error::InvalidState {
                    operation: "process inbound reply".to_string(),
                    reason: "app-writable base path is not set".to_string(),
                })?;
                let path = base.join(&file_name).to_string_lossy().into_owned();
                info!(name = %inbound.name, path = %path, "Received trained model reply");
                self.shared.set_trained_model(path);
                Ok(())
            }
            (_, kind) => {
                debug!(name = %inbound.name, ?kind, "Ignoring payload not handled by this role");
                Ok(())
            }
        }
    }
}

/// One offloading session over a pipeline runtime and a transport
pub struct Session<R, T> {
    runtime: Arc<R>,
    transport: Arc<T>,
    phase: Phase,
    plan: Option<TransferPlan>,
    shared: Arc<SessionShared>,
    pipeline: Option<PipelineHandle>,
    nodes: NodeRegistry,
    monitor: Option<ReceiveMonitor>,
    sink_events: Option<mpsc::Receiver<SinkEvent>>,
}

impl<R: PipelineRuntime, T: Transport> Session<R, T> {
    /// Create an unconfigured session
    pub fn new(runtime: Arc<R>, transport: Arc<T>) -> Self {
        Self {
            runtime,
            transport,
            phase: Phase::Created,
            plan: None,
            shared: Arc::new(SessionShared::default()),
            pipeline: None,
            nodes: NodeRegistry::new(),
            monitor: None,
            sink_events: None,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The trained-model path, once known
    pub fn trained_model_path(&self) -> Option<String> {
        self.shared.trained_model_path()
    }

    /// Registered pipeline nodes
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// Handle of the constructed pipeline, if any
    pub fn pipeline(&self) -> Option<PipelineHandle> {
        self.pipeline
    }

    /// Compile the configuration document into this session's plan
    ///
    /// A rejected document leaves the session unconfigured but
    /// destroyable.
    pub fn configure(&mut self, document: &serde_json::Value) -> Result<()> {
        if self.phase != Phase::Created {
            return Err(Error::InvalidState {
                operation: "configure".to_string(),
                reason: format!("session is in {:?}", self.phase),
            });
        }

        let plan = TransferPlan::compile(document)?;
        if let Some(trained_model) = plan.trained_model.clone() {
            self.shared.set_trained_model(trained_model);
        }

        info!(
            role = ?plan.role,
            items = plan.items.len(),
            limit_secs = plan.time_limit.as_secs(),
            "Offloading session configured"
        );

        self.plan = Some(plan);
        self.phase = Phase::Configured;
        Ok(())
    }

    /// Set the app-writable root every `@APP_RW_PATH@` token resolves to
    pub fn set_base_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidParameter {
                message: "base path must not be empty".to_string(),
            });
        }
        self.shared.set_base_path(path);
        Ok(())
    }

    /// Handle for the transport's delivery task; requires a configured
    /// session so the role is known
    pub fn inbound_handle(&self) -> Result<InboundHandle> {
        let role = self
            .plan
            .as_ref()
            .map(|plan| plan.role)
            .ok_or_else(|| Error::InvalidState {
                operation: "inbound_handle".to_string(),
                reason: "session is not configured".to_string(),
            })?;

        Ok(InboundHandle {
            role,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Take the output-node event stream; available after a receiver
    /// `start` registered at least one output node
    pub fn take_sink_events(&mut self) -> Option<mpsc::Receiver<SinkEvent>> {
        self.sink_events.take()
    }

    /// Run the role-dependent prepare sequence and start the pipeline
    pub async fn start(&mut self) -> Result<()> {
        match self.phase {
            Phase::Configured => {}
            Phase::Created => {
                return Err(Error::InvalidState {
                    operation: "start".to_string(),
                    reason: "session is not configured".to_string(),
                });
            }
            phase => {
                return Err(Error::InvalidState {
                    operation: "start".to_string(),
                    reason: format!("session is in {phase:?}"),
                });
            }
        }

        let role = self
            .plan
            .as_ref()
            .map(|plan| plan.role)
            .ok_or_else(|| Error::InvalidState {
                operation: "start".to_string(),
                reason: "session is not configured".to_string(),
            })?;
        let base = self.shared.base_path().ok_or_else(|| Error::InvalidState {
            operation: "start".to_string(),
            reason: "app-writable base path is not set".to_string(),
        })?;

        self.phase = Phase::Preparing;
        let prepared = match role {
            Role::Sender => self.prepare_sender(&base).await,
            Role::Receiver => self.prepare_receiver(&base).await,
        };

        let started = match prepared {
            Ok(pipeline) => self.runtime.start(&pipeline).await,
            Err(e) => Err(e),
        };

        if let Err(e) = started {
            self.rollback_start().await;
            self.phase = Phase::Configured;
            return Err(e);
        }

        self.phase = Phase::Running;
        info!(?role, "Offloading session running");
        Ok(())
    }

    /// Undo a partially-completed `start` attempt: drop the nodes and
    /// sink stream registered so far and destroy the pipeline if one was
    /// constructed, so a retry from `Configured` begins clean
    async fn rollback_start(&mut self) {
        self.nodes.clear();
        self.sink_events = None;

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = self.runtime.destroy(&pipeline).await {
                error!(error = %e, "Failed to destroy pipeline while aborting start");
            }
        }
    }

    /// Stop the pipeline; requires a previously constructed pipeline
    pub async fn stop(&mut self) -> Result<()> {
        let pipeline = self.pipeline.ok_or_else(|| Error::InvalidState {
            operation: "stop".to_string(),
            reason: "pipeline is not constructed".to_string(),
        })?;

        self.runtime.stop(&pipeline).await?;
        self.phase = Phase::Stopped;
        info!("Offloading session stopped");
        Ok(())
    }

    /// Tear the session down
    ///
    /// Idempotent and always runs to completion: the receiver's
    /// best-effort model reply and the pipeline destroy log failures
    /// instead of propagating them. Safe to call in any phase, including
    /// before configuration ever succeeded.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.phase == Phase::Destroyed {
            debug!("Session already destroyed");
            return Ok(());
        }

        if self.plan.as_ref().map(|plan| plan.role) == Some(Role::Receiver) {
            self.send_trained_model().await;
        }

        if let Some(monitor) = self.monitor.take() {
            monitor.join().await;
        }

        self.plan = None;
        self.nodes.clear();
        self.sink_events = None;

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = self.runtime.destroy(&pipeline).await {
                error!(error = %e, "Failed to destroy pipeline, releasing the handle anyway");
            }
        }

        self.shared.clear();
        self.phase = Phase::Destroyed;
        info!("Offloading session destroyed");
        Ok(())
    }

    /// Send every transfer item, the pipeline template last, then
    /// construct the rewritten sender pipeline
    async fn prepare_sender(&mut self, base: &Path) -> Result<PipelineHandle> {
        let plan = self.plan.as_ref().ok_or_else(|| Error::InvalidState {
            operation: "start".to_string(),
            reason: "session is not configured".to_string(),
        })?;
        let base_str = base.to_string_lossy();

        let mut pipeline_item: Option<(&str, &str)> = None;
        for (name, item) in &plan.items {
            match item {
                TransferItem::File(path) => {
                    let resolved = paths::substitute(path, paths::APP_RW_PATH, &base_str);
                    let contents =
                        tokio::fs::read(&resolved)
                            .await
                            .map_err(|source| Error::FileRead {
                                path: resolved.clone(),
                                source,
                            })?;
                    debug!(item = %name, path = %resolved, size = contents.len(), "Requesting transfer item");
                    self.transport
                        .request(name, Bytes::from(contents), TransferKind::File)
                        .await?;
                }
                TransferItem::PipelineTemplate(template) => {
                    pipeline_item = Some((name.as_str(), template.as_str()));
                }
            }
        }

        if let Some((name, template)) = pipeline_item {
            // Always last: its arrival tells the receiver the transfer is
            // complete. The remote-root token inside is resolved by the
            // receiver.
            debug!(item = %name, "Requesting pipeline template");
            self.transport
                .request(name, Bytes::from(template.to_string()), TransferKind::PipelineDescriptor)
                .await?;
        }

        let sender_pipe = plan
            .sender_pipeline
            .as_deref()
            .ok_or_else(|| Error::InvalidState {
                operation: "start".to_string(),
                reason: "sender pipeline is not configured".to_string(),
            })?;
        let description = paths::substitute(sender_pipe, paths::APP_RW_PATH, &base_str);

        let pipeline = self.runtime.construct(&description).await?;
        self.pipeline = Some(pipeline);
        Ok(pipeline)
    }

    /// Wait for the transfer to complete, rewrite the received templates
    /// and construct the pipeline they describe
    async fn prepare_receiver(&mut self, base: &Path) -> Result<PipelineHandle> {
        let time_limit = self
            .plan
            .as_ref()
            .map(|plan| plan.time_limit)
            .ok_or_else(|| Error::InvalidState {
                operation: "start".to_string(),
                reason: "session is not configured".to_string(),
            })?;

        let mut monitor = ReceiveMonitor::spawn(Arc::clone(&self.shared), time_limit);
        info!(
            limit_secs = time_limit.as_secs(),
            "Waiting for transfer data"
        );
        let outcome = monitor.wait().await;
        self.monitor = Some(monitor);

        if outcome != ReceiveState::Received {
            return Err(Error::Timeout {
                operation: "receive transfer data".to_string(),
                timeout_ms: time_limit.as_millis() as u64,
            });
        }

        let base_str = base.to_string_lossy();
        let trained_model =
            self.shared
                .rewrite_trained_model(&base_str)
                .ok_or_else(|| Error::InvalidState {
                    operation: "start".to_string(),
                    reason: "trained-model path is not configured".to_string(),
                })?;
        let descriptor = self
            .shared
            .rewrite_descriptor(&base_str, &trained_model)
            .ok_or_else(|| Error::InvalidState {
                operation: "start".to_string(),
                reason: "pipeline descriptor is not available".to_string(),
            })?;

        let envelope: serde_json::Value =
            serde_json::from_str(&descriptor).map_err(|e| Error::InvalidConfig {
                message: format!("received pipeline descriptor is not valid JSON: {e}"),
            })?;
        let pipe = envelope
            .get("pipeline")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| Error::InvalidConfig {
                message: "received descriptor has no pipeline object".to_string(),
            })?;
        let description = pipe
            .get("description")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::InvalidConfig {
                message: "received pipeline has no description".to_string(),
            })?;

        // Held by the session from here on, so teardown can always reach
        // it even when node registration below fails.
        let pipeline = self.runtime.construct(description).await?;
        self.pipeline = Some(pipeline);

        let (sink_tx, sink_rx) = mpsc::channel(SINK_QUEUE_DEPTH);
        self.sink_events = Some(sink_rx);

        if let Some(node) = pipe.get("output_node") {
            self.register_declared_nodes(&pipeline, node, NodeKind::Output, &sink_tx)
                .await?;
        }
        if let Some(node) = pipe.get("training_node") {
            self.register_declared_nodes(&pipeline, node, NodeKind::Training, &sink_tx)
                .await?;
        }

        Ok(pipeline)
    }

    /// Register the nodes one `output_node`/`training_node` declaration
    /// names; accepts a single object or an array of objects
    async fn register_declared_nodes(
        &mut self,
        pipeline: &PipelineHandle,
        node: &serde_json::Value,
        kind: NodeKind,
        sink_tx: &mpsc::Sender<SinkEvent>,
    ) -> Result<()> {
        let objects: Vec<&serde_json::Map<String, serde_json::Value>> = match node {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| Error::InvalidConfig {
                        message: "pipeline node entries must be objects".to_string(),
                    })
                })
                .collect::<Result<_>>()?,
            serde_json::Value::Object(object) => vec![object],
            _ => {
                return Err(Error::InvalidConfig {
                    message: "pipeline node declaration must be an object or an array".to_string(),
                });
            }
        };

        for object in objects {
            let name = object
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::InvalidConfig {
                    message: "pipeline node declaration has no name".to_string(),
                })?;

            if self.nodes.contains(name) {
                return Err(Error::DuplicateNode {
                    name: name.to_string(),
                });
            }

            let node_info = match kind {
                NodeKind::Training => {
                    let element = self.runtime.element(pipeline, name).await?;
                    NodeInfo::training(name, element)
                }
                NodeKind::Output => {
                    let sink = self
                        .runtime
                        .register_sink(pipeline, name, sink_tx.clone())
                        .await?;
                    NodeInfo::output(name, sink)
                }
            };

            self.nodes.register(node_info)?;
            debug!(node = name, ?kind, "Pipeline node registered");
        }

        Ok(())
    }

    /// Best-effort reply with the trained model to every party in the
    /// plan; failures are logged and teardown continues
    async fn send_trained_model(&self) {
        let Some(plan) = self.plan.as_ref() else {
            return;
        };
        let Some(path) = self.shared.trained_model_path() else {
            return;
        };

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read trained model, skipping reply");
                return;
            }
        };

        let file_name = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let data = Bytes::from(contents);

        for name in plan.items.keys() {
            if let Err(e) = self
                .transport
                .request(
                    name,
                    data.clone(),
                    TransferKind::Reply {
                        file_name: file_name.clone(),
                    },
                )
                .await
            {
                error!(item = %name, error = %e, "Failed to reply with trained model");
            }
        }

        info!(path = %path, "Trained model sent back");
    }
}
