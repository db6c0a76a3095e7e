//! Blocking dispatcher: owns the worker pool and performs the rendezvous
//! between submitted tasks and idle workers.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::task::{event_channels, BoxedTask, TaskEvents};
use crate::worker::{IdleHandle, Worker};

/// Lifecycle of a dispatcher. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl DispatcherState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: DispatcherState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    fn get(&self) -> DispatcherState {
        DispatcherState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: DispatcherState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move `from -> to`; on mismatch returns the actual state.
    fn transition(&self, from: DispatcherState, to: DispatcherState) -> Result<(), DispatcherState> {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(DispatcherState::from_u8)
    }
}

/// Common surface of the blocking and non-blocking dispatchers.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Submit a task for execution by exactly one worker.
    async fn dispatch(&self, task: BoxedTask) -> Result<(), DispatchError>;

    /// Stop accepting work and wait for accepted tasks to finish.
    async fn stop(&self) -> Result<(), DispatchError>;
}

/// Fixed-size worker pool with a blocking [`dispatch`](Dispatcher::dispatch).
///
/// `dispatch` waits until an idle worker has taken the task. Workers are
/// spawned by [`start`](Dispatcher::start); [`stop`](Dispatcher::stop)
/// waits for every worker to finish its current task and then closes the
/// event streams.
pub struct Dispatcher {
    config: DispatcherConfig,
    state: StateCell,
    /// Idle workers announce themselves here. Holding the lock covers one
    /// complete hand-off, which lets `stop` wait for in-flight hand-offs.
    idle: Mutex<mpsc::Receiver<IdleHandle>>,
    pending: Mutex<Vec<Worker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stop_token: CancellationToken,
    abort_token: CancellationToken,
}

impl Dispatcher {
    /// Build a pool of `config.workers` workers and the streams they report on.
    pub fn new(config: DispatcherConfig) -> (Self, TaskEvents) {
        let size = config.workers.max(1);
        let (pool_tx, pool_rx) = mpsc::channel(size);
        let (senders, events) = event_channels();
        let stop_token = CancellationToken::new();
        let abort_token = CancellationToken::new();

        let workers = (0..size)
            .map(|id| {
                Worker::new(
                    id,
                    pool_tx.clone(),
                    senders.clone(),
                    stop_token.clone(),
                    abort_token.clone(),
                    config.task_timeout,
                )
            })
            .collect();

        let dispatcher = Self {
            config,
            state: StateCell::new(DispatcherState::Created),
            idle: Mutex::new(pool_rx),
            pending: Mutex::new(workers),
            handles: Mutex::new(Vec::with_capacity(size)),
            stop_token,
            abort_token,
        };
        (dispatcher, events)
    }

    pub fn state(&self) -> DispatcherState {
        self.state.get()
    }

    pub fn worker_count(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Spawn the workers. Valid exactly once, from `Created`.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let mut pending = self.pending.lock().await;
        self.state
            .transition(DispatcherState::Created, DispatcherState::Running)
            .map_err(|_| DispatchError::AlreadyStarted)?;

        let workers = std::mem::take(&mut *pending);
        tracing::debug!(count = workers.len(), "Starting workers");
        self.handles
            .lock()
            .await
            .extend(workers.into_iter().map(Worker::spawn));
        tracing::info!(workers = self.worker_count(), "Dispatcher started");
        Ok(())
    }

    /// Hand `task` to the next idle worker, waiting for one if all are busy.
    pub async fn dispatch(&self, task: BoxedTask) -> Result<(), DispatchError> {
        self.ensure_running()?;
        let mut idle = self.idle.lock().await;
        // `stop` may have begun while this call waited for the lock.
        self.ensure_running()?;

        let worker = idle.recv().await.ok_or(DispatchError::Closed)?;
        tracing::debug!(task_id = %task.id(), "Dispatching task");
        worker.send(task).await.map_err(|_| DispatchError::Closed)
    }

    /// Stop the pool. Tasks already handed to a worker run to completion,
    /// or until the configured grace period cancels them.
    pub async fn stop(&self) -> Result<(), DispatchError> {
        self.state
            .transition(DispatcherState::Running, DispatcherState::Stopping)
            .map_err(DispatchError::NotRunning)?;
        tracing::info!("Stopping dispatcher");

        // Wait out any hand-off in progress, then keep new ones out.
        let _idle = self.idle.lock().await;
        self.stop_token.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        tracing::info!(count = handles.len(), "Waiting for workers to stop");
        let mut joined = Box::pin(join_all(handles));

        let results = match self.config.shutdown_grace {
            Some(grace) => match tokio::time::timeout(grace, &mut joined).await {
                Ok(results) => results,
                Err(_) => {
                    tracing::warn!(grace = ?grace, "Shutdown grace elapsed, cancelling in-flight tasks");
                    self.abort_token.cancel();
                    joined.await
                }
            },
            None => joined.await,
        };

        for result in results {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker terminated abnormally");
            }
        }

        self.state.set(DispatcherState::Stopped);
        tracing::info!("Dispatcher stopped");
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), DispatchError> {
        match self.state.get() {
            DispatcherState::Running => Ok(()),
            other => Err(DispatchError::NotRunning(other)),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop_token.cancel();
    }
}

#[async_trait]
impl TaskDispatcher for Dispatcher {
    async fn dispatch(&self, task: BoxedTask) -> Result<(), DispatchError> {
        Dispatcher::dispatch(self, task).await
    }

    async fn stop(&self) -> Result<(), DispatchError> {
        Dispatcher::stop(self).await
    }
}
