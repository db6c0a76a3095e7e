//! The unit of asynchronous work and the events it produces.
//!
//! A [`Task`] is executed exactly once by one worker. While it runs it may
//! emit any number of [`TaskStatus`] events through its [`StatusSink`];
//! when it returns, the worker emits exactly one terminal event:
//! [`Completion`] for `Ok(())`, [`Failure`] for `Err(_)`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Opaque, caller-assigned task identity.
pub type TaskId = String;

/// A unit of asynchronous work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Identity used to correlate this task's events.
    fn id(&self) -> &str;

    /// Run the task to completion or failure.
    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<()>;
}

/// Tasks travel through the pool boxed.
pub type BoxedTask = Box<dyn Task>;

/// Non-terminal progress observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub message: String,
}

/// Terminal event: the task returned `Ok(())`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub task_id: TaskId,
}

/// Terminal event: the task returned an error, panicked or timed out.
#[derive(Debug)]
pub struct Failure {
    pub task_id: TaskId,
    pub error: anyhow::Error,
}

/// Emits status events tagged with one task's identity.
#[derive(Debug, Clone)]
pub struct StatusSink {
    task_id: TaskId,
    tx: mpsc::Sender<TaskStatus>,
}

impl StatusSink {
    pub(crate) fn new(task_id: TaskId, tx: mpsc::Sender<TaskStatus>) -> Self {
        Self { task_id, tx }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Deliver a status message to the shared status stream.
    ///
    /// Waits while the stream is full. If the consumer is gone the message
    /// is dropped.
    pub async fn emit(&self, message: impl Into<String>) {
        let status = TaskStatus {
            task_id: self.task_id.clone(),
            message: message.into(),
        };
        if self.tx.send(status).await.is_err() {
            tracing::debug!(task_id = %self.task_id, "Status stream closed, dropping status");
        }
    }
}

/// Everything a running task may use besides its own state.
#[derive(Debug, Clone)]
pub struct TaskContext {
    status: StatusSink,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(status: StatusSink, cancel: CancellationToken) -> Self {
        Self { status, cancel }
    }

    pub fn task_id(&self) -> &str {
        self.status.task_id()
    }

    /// Shorthand for [`StatusSink::emit`].
    pub async fn emit(&self, message: impl Into<String>) {
        self.status.emit(message).await;
    }

    /// Set once the pool asks in-flight tasks to give up (shutdown grace
    /// period elapsed). Cooperative: the task decides how to react.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Receiving ends of the three aggregated event streams.
///
/// All three close once every worker of the pool has stopped.
#[derive(Debug)]
pub struct TaskEvents {
    pub status: mpsc::Receiver<TaskStatus>,
    pub complete: mpsc::Receiver<Completion>,
    pub error: mpsc::Receiver<Failure>,
}

/// Sending ends of the event streams, one clone per worker.
#[derive(Debug, Clone)]
pub(crate) struct EventSenders {
    pub status: mpsc::Sender<TaskStatus>,
    pub complete: mpsc::Sender<Completion>,
    pub error: mpsc::Sender<Failure>,
}

/// Capacity of each event stream. One slot is the closest tokio gets to an
/// unbuffered channel; a slow consumer stalls the emitting worker.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1;

pub(crate) fn event_channels() -> (EventSenders, TaskEvents) {
    let (status_tx, status_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (complete_tx, complete_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (error_tx, error_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (
        EventSenders {
            status: status_tx,
            complete: complete_tx,
            error: error_tx,
        },
        TaskEvents {
            status: status_rx,
            complete: complete_rx,
            error: error_rx,
        },
    )
}
