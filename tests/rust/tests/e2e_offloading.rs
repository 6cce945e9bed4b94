//! End-to-end offloading simulation
//!
//! Runs a sender session and a receiver session in one process, wired
//! through the loopback transport:
//! - the sender ships a training file and a pipeline template
//! - the receiver waits for completeness, rewrites the templates and
//!   runs the in-process pipeline
//! - training output flows back through the registered output node
//! - teardown replies with the trained model, which the sender stores
//!   under its own app-writable root

use anyhow::Result;
use bytes::Bytes;
use pipeline_runtime::{InProcessRuntime, PipelineState};
use serde_json::json;
use session::{Phase, Session};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use transport::{loopback, LoopbackEndpoint, TransferKind};

/// Log output is opt-in via RUST_LOG, as usual for integration runs.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn sender_config() -> serde_json::Value {
    json!({
        "node-type": "sender",
        "training": {
            "time-limit": 10,
            "sender-pipeline":
                "datareposrc location=@APP_RW_PATH@/train.dat name=feed ! edgesink name=uplink",
            "transfer-data": {
                "train.dat": "@APP_RW_PATH@/train.dat",
                "training-pipeline": {
                    "pipeline": {
                        "description":
                            "edgesrc location=@REMOTE_APP_RW_PATH@/train.dat ! \
                             trainer name=training0 model-save-path=@TRAINED_MODEL_FILE@ ! \
                             tensor_sink name=result0",
                        "output_node": [ { "name": "result0" } ],
                        "training_node": [ { "name": "training0" } ]
                    }
                }
            }
        }
    })
}

fn receiver_config() -> serde_json::Value {
    json!({
        "node-type": "receiver",
        "training": {
            "time-limit": 5,
            "transfer-data": { "trained-model": "@APP_RW_PATH@/model-v1.bin" }
        }
    })
}

/// Forward the receiver's inbound queue the way the embedding service
/// does: persist plain files under the app-writable root, hand
/// everything else to the session.
fn pump_receiver_inbound(
    endpoint: &LoopbackEndpoint,
    session: &Session<InProcessRuntime, LoopbackEndpoint>,
    base: &Path,
) -> Result<()> {
    let mut inbound = endpoint
        .take_inbound()
        .ok_or_else(|| anyhow::anyhow!("inbound queue already taken"))?;
    let handle = session.inbound_handle()?;
    let base = base.to_path_buf();

    tokio::spawn(async move {
        while let Some(payload) = inbound.recv().await {
            match payload.kind {
                TransferKind::File => {
                    tokio::fs::write(base.join(&payload.name), &payload.data)
                        .await
                        .expect("failed to persist transfer file");
                }
                _ => handle.process(payload).expect("inbound dispatch failed"),
            }
        }
    });

    Ok(())
}

/// Forward the sender's inbound queue: persist reply payloads under the
/// sender's root, then let the session record the model location.
fn pump_sender_inbound(
    endpoint: &LoopbackEndpoint,
    session: &Session<InProcessRuntime, LoopbackEndpoint>,
    base: &Path,
) -> Result<()> {
    let mut inbound = endpoint
        .take_inbound()
        .ok_or_else(|| anyhow::anyhow!("inbound queue already taken"))?;
    let handle = session.inbound_handle()?;
    let base = base.to_path_buf();

    tokio::spawn(async move {
        while let Some(payload) = inbound.recv().await {
            if let TransferKind::Reply { file_name } = &payload.kind {
                tokio::fs::write(base.join(file_name), &payload.data)
                    .await
                    .expect("failed to persist reply");
            }
            handle.process(payload).expect("inbound dispatch failed");
        }
    });

    Ok(())
}

#[tokio::test]
async fn test_full_offloading_round_trip() -> Result<()> {
    init_tracing();

    let sender_dir = tempfile::tempdir()?;
    let receiver_dir = tempfile::tempdir()?;
    std::fs::write(sender_dir.path().join("train.dat"), b"labelled samples")?;

    let (sender_ep, receiver_ep) = loopback::pair();
    let sender_ep = Arc::new(sender_ep);
    let receiver_ep = Arc::new(receiver_ep);

    let sender_runtime = Arc::new(InProcessRuntime::new());
    let receiver_runtime = Arc::new(InProcessRuntime::new());

    let mut sender = Session::new(Arc::clone(&sender_runtime), Arc::clone(&sender_ep));
    let mut receiver = Session::new(Arc::clone(&receiver_runtime), Arc::clone(&receiver_ep));

    sender.configure(&sender_config())?;
    sender.set_base_path(sender_dir.path())?;
    receiver.configure(&receiver_config())?;
    receiver.set_base_path(receiver_dir.path())?;

    pump_sender_inbound(&sender_ep, &sender, sender_dir.path())?;
    pump_receiver_inbound(&receiver_ep, &receiver, receiver_dir.path())?;

    // The receiver blocks until the pipeline descriptor arrives, so it
    // starts first and the sender transmits while it waits.
    let receiver_task = tokio::spawn(async move {
        let started = receiver.start().await;
        started.map(|()| receiver)
    });
    sleep(Duration::from_millis(100)).await;
    sender.start().await?;
    assert_eq!(sender.phase(), Phase::Running);

    let mut receiver = receiver_task.await??;
    assert_eq!(receiver.phase(), Phase::Running);

    // The transferred file landed under the receiver's root.
    assert_eq!(
        std::fs::read(receiver_dir.path().join("train.dat"))?,
        b"labelled samples"
    );

    // Every placeholder is resolved on the receiver side.
    let trained_path = receiver
        .trained_model_path()
        .expect("trained model path must be set");
    assert!(!offload_core::paths::has_placeholder(&trained_path));
    assert_eq!(
        trained_path,
        receiver_dir
            .path()
            .join("model-v1.bin")
            .to_string_lossy()
            .as_ref()
    );

    let pipeline = receiver.pipeline().expect("pipeline must be constructed");
    let description = receiver_runtime.description(&pipeline).unwrap();
    assert!(!offload_core::paths::has_placeholder(&description));
    assert!(description.contains(receiver_dir.path().to_string_lossy().as_ref()));

    // Declared nodes resolved: training element + output sink.
    assert!(receiver.nodes().contains("training0"));
    assert!(receiver.nodes().contains("result0"));

    // Training output flows back through the registered output node.
    let mut sink_events = receiver
        .take_sink_events()
        .expect("sink events must be available");
    receiver_runtime
        .emit_sink_data(&pipeline, "result0", Bytes::from_static(b"loss=0.03"))
        .await?;
    let event = sink_events.recv().await.expect("sink event expected");
    assert_eq!(event.node, "result0");
    assert_eq!(event.data, Bytes::from_static(b"loss=0.03"));

    // Training finishes: the pipeline wrote the model, the session stops.
    std::fs::write(receiver_dir.path().join("model-v1.bin"), b"trained-weights")?;
    receiver.stop().await?;
    assert_eq!(receiver_runtime.state(&pipeline), Some(PipelineState::Stopped));

    // Teardown replies with the trained model.
    receiver.destroy().await?;
    assert_eq!(receiver.phase(), Phase::Destroyed);

    let mut sender_model = None;
    for _ in 0..20 {
        if let Some(path) = sender.trained_model_path() {
            sender_model = Some(path);
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    let sender_model = sender_model.expect("sender never learned the model location");
    assert_eq!(
        sender_model,
        sender_dir
            .path()
            .join("model-v1.bin")
            .to_string_lossy()
            .as_ref()
    );
    assert_eq!(std::fs::read(&sender_model)?, b"trained-weights");

    sender.stop().await?;
    sender.destroy().await?;
    Ok(())
}

#[tokio::test]
async fn test_receiver_timeout_leaves_session_destroyable() -> Result<()> {
    init_tracing();

    let receiver_dir = tempfile::tempdir()?;
    let (_sender_ep, receiver_ep) = loopback::pair();

    let runtime = Arc::new(InProcessRuntime::new());
    let mut receiver = Session::new(runtime, Arc::new(receiver_ep));

    receiver.configure(&json!({
        "node-type": "receiver",
        "training": {
            "time-limit": 1,
            "transfer-data": { "trained-model": "@APP_RW_PATH@/model.bin" }
        }
    }))?;
    receiver.set_base_path(receiver_dir.path())?;

    // No descriptor ever arrives; start fails with a timeout but the
    // session can still be torn down cleanly, twice.
    let err = receiver.start().await.unwrap_err();
    assert!(err.is_timeout());

    receiver.destroy().await?;
    receiver.destroy().await?;
    assert_eq!(receiver.phase(), Phase::Destroyed);
    Ok(())
}
