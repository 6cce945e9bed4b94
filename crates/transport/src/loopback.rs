//! In-memory loopback transport
//!
//! Two endpoints connected by bounded channels; whatever one side
//! requests shows up in the other side's inbound queue. Used by the
//! integration tests to run a sender and a receiver session in one
//! process.

use async_trait::async_trait;
use bytes::Bytes;
use offload_core::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::transfer::{Inbound, Transport, TransferKind};

const QUEUE_DEPTH: usize = 32;

/// One side of a loopback transport pair
pub struct LoopbackEndpoint {
    peer_tx: mpsc::Sender<Inbound>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Inbound>>>,
}

/// Create a connected pair of loopback endpoints
pub fn pair() -> (LoopbackEndpoint, LoopbackEndpoint) {
    let (a_tx, a_rx) = mpsc::channel(QUEUE_DEPTH);
    let (b_tx, b_rx) = mpsc::channel(QUEUE_DEPTH);

    let a = LoopbackEndpoint {
        peer_tx: b_tx,
        inbound_rx: Mutex::new(Some(a_rx)),
    };
    let b = LoopbackEndpoint {
        peer_tx: a_tx,
        inbound_rx: Mutex::new(Some(b_rx)),
    };
    (a, b)
}

impl LoopbackEndpoint {
    /// Take this endpoint's inbound queue; yields `None` after the first
    /// call
    pub fn take_inbound(&self) -> Option<mpsc::Receiver<Inbound>> {
        self.inbound_rx.lock().take()
    }
}

#[async_trait]
impl Transport for LoopbackEndpoint {
    async fn request(&self, name: &str, data: Bytes, kind: TransferKind) -> Result<()> {
        debug!(name, size = data.len(), ?kind, "Loopback request");

        self.peer_tx
            .send(Inbound {
                name: name.to_string(),
                data,
                kind,
            })
            .await
            .map_err(|_| Error::Transport {
                message: format!("peer endpoint closed while requesting '{name}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_reaches_peer() {
        let (local, remote) = pair();
        let mut inbound = remote.take_inbound().unwrap();

        local
            .request("file-a", Bytes::from_static(b"payload"), TransferKind::File)
            .await
            .unwrap();

        let received = inbound.recv().await.unwrap();
        assert_eq!(received.name, "file-a");
        assert_eq!(received.data, Bytes::from_static(b"payload"));
        assert_eq!(received.kind, TransferKind::File);
    }

    #[tokio::test]
    async fn test_kind_tag_travels_with_payload() {
        let (local, remote) = pair();
        let mut inbound = remote.take_inbound().unwrap();

        local
            .request(
                "trained-model",
                Bytes::from_static(b"weights"),
                TransferKind::Reply {
                    file_name: "model.bin".to_string(),
                },
            )
            .await
            .unwrap();

        let received = inbound.recv().await.unwrap();
        assert_eq!(
            received.kind,
            TransferKind::Reply {
                file_name: "model.bin".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_request_fails_after_peer_dropped() {
        let (local, remote) = pair();
        drop(remote);

        let result = local
            .request("file-a", Bytes::from_static(b"x"), TransferKind::File)
            .await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test]
    async fn test_inbound_queue_taken_once() {
        let (local, _remote) = pair();
        assert!(local.take_inbound().is_some());
        assert!(local.take_inbound().is_none());
    }
}
