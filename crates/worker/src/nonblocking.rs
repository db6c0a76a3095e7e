//! Dispatcher front-end whose `dispatch` never waits for a free worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::dispatcher::{Dispatcher, DispatcherState, TaskDispatcher};
use crate::error::DispatchError;
use crate::task::{BoxedTask, TaskEvents};

/// Wraps a [`Dispatcher`] with an unbounded FIFO intake queue.
///
/// [`dispatch`](Self::dispatch) enqueues and returns immediately; one
/// background loop drains the queue into the blocking dispatcher in
/// submission order. [`stop`](Self::stop) closes the intake, lets the loop
/// drain what was already accepted, then stops the pool.
pub struct NonBlockingDispatcher {
    inner: Arc<Dispatcher>,
    intake: mpsc::UnboundedSender<BoxedTask>,
    intake_rx: Mutex<Option<mpsc::UnboundedReceiver<BoxedTask>>>,
    intake_loop: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    close_token: CancellationToken,
}

impl NonBlockingDispatcher {
    pub fn new(config: DispatcherConfig) -> (Self, TaskEvents) {
        let (inner, events) = Dispatcher::new(config);
        let (intake, intake_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            inner: Arc::new(inner),
            intake,
            intake_rx: Mutex::new(Some(intake_rx)),
            intake_loop: Mutex::new(None),
            closed: AtomicBool::new(false),
            close_token: CancellationToken::new(),
        };
        (dispatcher, events)
    }

    pub fn state(&self) -> DispatcherState {
        self.inner.state()
    }

    /// Start the pool and the intake loop.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let mut intake_rx = self.intake_rx.lock().await;
        self.inner.start().await?;

        if let Some(rx) = intake_rx.take() {
            let handle = tokio::spawn(intake_loop(
                Arc::clone(&self.inner),
                rx,
                self.close_token.clone(),
            ));
            *self.intake_loop.lock().await = Some(handle);
        }
        Ok(())
    }

    /// Queue `task` and return without waiting for a worker.
    pub fn dispatch(&self, task: BoxedTask) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }
        match self.inner.state() {
            DispatcherState::Running => {}
            other => return Err(DispatchError::NotRunning(other)),
        }
        self.intake.send(task).map_err(|_| DispatchError::Closed)
    }

    /// Close the intake, wait for queued tasks to reach a worker and finish,
    /// then stop the pool.
    pub async fn stop(&self) -> Result<(), DispatchError> {
        match self.inner.state() {
            DispatcherState::Running => {}
            other => return Err(DispatchError::NotRunning(other)),
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::Closed);
        }

        self.close_token.cancel();
        if let Some(handle) = self.intake_loop.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Intake loop terminated abnormally");
            }
        }
        self.inner.stop().await
    }
}

async fn intake_loop(
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::UnboundedReceiver<BoxedTask>,
    close: CancellationToken,
) {
    let mut closing = false;
    loop {
        tokio::select! {
            biased;
            task = rx.recv() => {
                let Some(task) = task else { break };
                let task_id = task.id().to_string();
                if let Err(e) = dispatcher.dispatch(task).await {
                    tracing::error!(task_id = %task_id, error = %e, "Dropping queued task");
                }
            }
            _ = close.cancelled(), if !closing => {
                // Refuse new sends; already queued tasks are still drained.
                rx.close();
                closing = true;
            }
        }
    }
    tracing::debug!("Intake loop drained");
}

#[async_trait]
impl TaskDispatcher for NonBlockingDispatcher {
    async fn dispatch(&self, task: BoxedTask) -> Result<(), DispatchError> {
        NonBlockingDispatcher::dispatch(self, task)
    }

    async fn stop(&self) -> Result<(), DispatchError> {
        NonBlockingDispatcher::stop(self).await
    }
}
