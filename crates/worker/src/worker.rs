//! A single pool worker.
//!
//! Run loop: announce idle -> wait for a task -> execute it -> emit exactly
//! one terminal event -> announce idle again, until told to stop. A stop
//! request never interrupts a task that has already been handed over.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::task::{BoxedTask, Completion, EventSenders, Failure, StatusSink, TaskContext};

/// Sender half through which an idle worker receives its next task.
pub(crate) type IdleHandle = mpsc::Sender<BoxedTask>;

pub(crate) struct Worker {
    id: usize,
    /// Rendezvous queue of idle workers, shared with the dispatcher.
    pool: mpsc::Sender<IdleHandle>,
    events: EventSenders,
    /// Ask the worker to exit once idle.
    stop: CancellationToken,
    /// Parent of every in-flight task's cancellation token.
    abort: CancellationToken,
    task_timeout: Option<Duration>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        pool: mpsc::Sender<IdleHandle>,
        events: EventSenders,
        stop: CancellationToken,
        abort: CancellationToken,
        task_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            pool,
            events,
            stop,
            abort,
            task_timeout,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let (task_tx, mut task_rx) = mpsc::channel::<BoxedTask>(1);

        loop {
            // Announce idle. The pool has one slot per worker so this only
            // waits if the dispatcher is gone.
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                sent = self.pool.send(task_tx.clone()) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            // A task already handed over wins against a concurrent stop.
            let task = tokio::select! {
                biased;
                task = task_rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
                _ = self.stop.cancelled() => break,
            };

            self.execute(task).await;
        }

        tracing::debug!(worker_id = self.id, "Stopped worker");
    }

    async fn execute(&self, task: BoxedTask) {
        let task_id = task.id().to_string();
        tracing::info!(worker_id = self.id, task_id = %task_id, "Worker got task");

        let ctx = TaskContext::new(
            StatusSink::new(task_id.clone(), self.events.status.clone()),
            self.abort.child_token(),
        );

        let run = AssertUnwindSafe(task.execute(ctx)).catch_unwind();
        let outcome = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(anyhow::anyhow!("task timed out after {limit:?}"))),
            },
            None => run.await,
        };

        let result = outcome.unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(worker_id = self.id, task_id = %task_id, reason = %reason, "Task panicked");
            Err(anyhow::anyhow!("task panicked: {reason}"))
        });

        match result {
            Ok(()) => {
                tracing::debug!(worker_id = self.id, task_id = %task_id, "Task completed");
                if self
                    .events
                    .complete
                    .send(Completion {
                        task_id: task_id.clone(),
                    })
                    .await
                    .is_err()
                {
                    tracing::warn!(task_id = %task_id, "Completion stream closed, dropping event");
                }
            }
            Err(error) => {
                tracing::debug!(worker_id = self.id, task_id = %task_id, error = %error, "Task failed");
                if self
                    .events
                    .error
                    .send(Failure {
                        task_id: task_id.clone(),
                        error,
                    })
                    .await
                    .is_err()
                {
                    tracing::warn!(task_id = %task_id, "Failure stream closed, dropping event");
                }
            }
        }
    }
}
