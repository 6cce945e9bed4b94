//! Receive-completeness monitor
//!
//! The remote sender transmits the pipeline description after every file,
//! so the descriptor's arrival is the signal that all transfer data is
//! present. A dedicated task polls for it under the configured deadline
//! and publishes the outcome exactly once; files the descriptor refers to
//! are not verified here and surface later as pipeline construction
//! failures if missing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::SessionShared;

/// Poll granularity of the monitor task
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of the receive wait, published exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    /// Monitor still polling
    Pending,

    /// Pipeline descriptor arrived before the deadline
    Received,

    /// Deadline elapsed without a descriptor
    TimedOut,
}

/// Background watcher for one receiver `start`
pub(crate) struct ReceiveMonitor {
    state: watch::Receiver<ReceiveState>,
    task: Option<JoinHandle<()>>,
}

impl ReceiveMonitor {
    /// Spawn the watcher task polling `shared` up to `time_limit`
    pub fn spawn(shared: Arc<SessionShared>, time_limit: Duration) -> Self {
        let (tx, rx) = watch::channel(ReceiveState::Pending);

        let task = tokio::spawn(async move {
            let mut remaining = time_limit;
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;

                if shared.descriptor_arrived() {
                    debug!("Pipeline descriptor arrived, transfer considered complete");
                    let _ = tx.send(ReceiveState::Received);
                    return;
                }

                if remaining <= POLL_INTERVAL {
                    break;
                }
                remaining -= POLL_INTERVAL;
            }

            warn!(
                limit_secs = time_limit.as_secs(),
                "Receive deadline elapsed without a pipeline descriptor"
            );
            let _ = tx.send(ReceiveState::TimedOut);
        });

        Self {
            state: rx,
            task: Some(task),
        }
    }

    /// Block until the monitor publishes an outcome
    ///
    /// Re-blocks through wakes that leave the state still pending; the
    /// monitor's own deadline bounds the wait, so no extra timeout is
    /// layered here.
    pub async fn wait(&mut self) -> ReceiveState {
        loop {
            let current = *self.state.borrow();
            if current != ReceiveState::Pending {
                return current;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow();
            }
        }
    }

    /// Join the watcher task; called from teardown before shared state is
    /// released
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Receive monitor task did not shut down cleanly");
            }
        }
    }
}
