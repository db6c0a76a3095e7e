//! Status router.
//!
//! A single task that consumes the dispatcher's status, completion and
//! failure streams. Every event becomes one `update_status` call on the
//! document store (serialized, so transitions of a document are applied in
//! event order) followed by an `UPDATE` push to the owner's connection.

use std::sync::Arc;
use std::time::Duration;

use snapdoc_core::document::{Document, DocumentStatus, MSG_COMPLETED};
use snapdoc_core::error::CoreError;
use snapdoc_core::messages::PushMessage;
use snapdoc_core::types::DocumentId;
use snapdoc_db::DocumentStore;
use snapdoc_worker::{Completion, Failure, TaskEvents, TaskStatus};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::ws::WsManager;

/// How the router retries a failed status write before dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistRetryPolicy {
    /// Extra attempts after the first failure. `0` = best effort.
    pub max_retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for PersistRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(200),
        }
    }
}

impl PersistRetryPolicy {
    /// Read `STATUS_PERSIST_RETRIES` (default `0`) and
    /// `STATUS_PERSIST_BACKOFF_MS` (default `200`).
    pub fn from_env() -> Self {
        let max_retries: u32 = std::env::var("STATUS_PERSIST_RETRIES")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("STATUS_PERSIST_RETRIES must be a valid u32");

        let backoff_ms: u64 = std::env::var("STATUS_PERSIST_BACKOFF_MS")
            .unwrap_or_else(|_| "200".into())
            .parse()
            .expect("STATUS_PERSIST_BACKOFF_MS must be a valid u64");

        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Consumes task events and applies them to the store and live connections.
pub struct StatusRouter {
    store: Arc<dyn DocumentStore>,
    ws_manager: Arc<WsManager>,
    retry: PersistRetryPolicy,
}

impl StatusRouter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ws_manager: Arc<WsManager>,
        retry: PersistRetryPolicy,
    ) -> Self {
        Self {
            store,
            ws_manager,
            retry,
        }
    }

    /// Run the router on its own task.
    pub fn spawn(self, events: TaskEvents) -> StatusRouterHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let join = tokio::spawn(self.run(events, stop_rx));
        StatusRouterHandle {
            stop_tx,
            join: Mutex::new(Some(join)),
        }
    }

    async fn run(self, mut events: TaskEvents, mut stop_rx: mpsc::Receiver<oneshot::Sender<()>>) {
        let mut status_open = true;
        let mut complete_open = true;
        let mut error_open = true;
        let mut stop_open = true;
        tracing::info!("Status router started");

        // Status is polled first and drained again before every terminal
        // event, so a task's progress is applied before its outcome. Events
        // win over a pending stop request.
        let ack = 'events: loop {
            if !(status_open || complete_open || error_open) {
                break 'events None;
            }
            tokio::select! {
                biased;
                status = events.status.recv(), if status_open => match status {
                    Some(status) => self.handle_status(status).await,
                    None => status_open = false,
                },
                completion = events.complete.recv(), if complete_open => match completion {
                    Some(completion) => {
                        self.drain_status(&mut events.status).await;
                        self.handle_complete(completion).await;
                    }
                    None => complete_open = false,
                },
                failure = events.error.recv(), if error_open => match failure {
                    Some(failure) => {
                        self.drain_status(&mut events.status).await;
                        self.handle_failure(failure).await;
                    }
                    None => error_open = false,
                },
                request = stop_rx.recv(), if stop_open => match request {
                    Some(ack) => break 'events Some(ack),
                    None => stop_open = false,
                },
            }
        };

        tracing::info!("Status router stopped");
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    /// Apply every status event already buffered. A worker only reports its
    /// outcome after its last status was accepted by the stream.
    async fn drain_status(&self, status: &mut mpsc::Receiver<TaskStatus>) {
        while let Ok(event) = status.try_recv() {
            self.handle_status(event).await;
        }
    }

    async fn handle_status(&self, status: TaskStatus) {
        tracing::info!(task_id = %status.task_id, message = %status.message, "Task updated its status");
        self.apply(&status.task_id, DocumentStatus::Capturing, &status.message)
            .await;
    }

    async fn handle_complete(&self, completion: Completion) {
        tracing::info!(task_id = %completion.task_id, "Task completed successfully");
        self.apply(&completion.task_id, DocumentStatus::Complete, MSG_COMPLETED)
            .await;
    }

    async fn handle_failure(&self, failure: Failure) {
        tracing::info!(task_id = %failure.task_id, error = %failure.error, "Task failed");
        let message = format!("Failed with error: {:#}", failure.error);
        self.apply(&failure.task_id, DocumentStatus::Error, &message)
            .await;
    }

    async fn apply(&self, task_id: &str, status: DocumentStatus, message: &str) {
        let Ok(id) = task_id.parse::<DocumentId>() else {
            tracing::warn!(task_id = %task_id, "Task id is not a document id, dropping event");
            return;
        };

        match self.persist(id, status, message).await {
            Ok(document) => self.push(document).await,
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to store document status update");
            }
        }
    }

    async fn persist(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        message: &str,
    ) -> Result<Document, CoreError> {
        let mut attempt = 0;
        loop {
            match self.store.update_status(id, status, Some(message)).await {
                Ok(document) => return Ok(document),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(document_id = %id, attempt, error = %e, "Retrying status update");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn push(&self, document: Document) {
        let owner = document.owner.clone();
        if !self
            .ws_manager
            .push_to_owner(&owner, PushMessage::update(document))
            .await
        {
            tracing::debug!(owner = %owner, "No live connection took the update");
        }
    }
}

/// Control handle of a spawned [`StatusRouter`].
pub struct StatusRouterHandle {
    stop_tx: mpsc::Sender<oneshot::Sender<()>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl StatusRouterHandle {
    /// Ask the router to stop and wait until it has.
    ///
    /// Events the router already received are processed first. Returns
    /// immediately if the router exited on its own (all streams closed).
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.stop_tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }

        if let Some(join) = self.join.lock().await.take() {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "Status router terminated abnormally");
            }
        }
    }

    /// `true` once the router task has exited.
    pub async fn is_finished(&self) -> bool {
        self.join
            .lock()
            .await
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }
}
