#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snapdoc_worker::{BoxedTask, Task, TaskContext, TaskEvents};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// One event observed on the aggregated streams, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Status(String, String),
    Complete(String),
    Failed(String, String),
}

impl Observed {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Status(id, _) | Self::Complete(id) | Self::Failed(id, _) => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Status(..))
    }
}

/// Drain all three streams until they close. Status is polled first so a
/// task's progress is observed before its terminal event.
pub fn spawn_collector(mut events: TaskEvents) -> JoinHandle<Vec<Observed>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        let (mut status_open, mut complete_open, mut error_open) = (true, true, true);
        while status_open || complete_open || error_open {
            tokio::select! {
                biased;
                s = events.status.recv(), if status_open => match s {
                    Some(s) => seen.push(Observed::Status(s.task_id, s.message)),
                    None => status_open = false,
                },
                c = events.complete.recv(), if complete_open => match c {
                    Some(c) => seen.push(Observed::Complete(c.task_id)),
                    None => complete_open = false,
                },
                e = events.error.recv(), if error_open => match e {
                    Some(e) => seen.push(Observed::Failed(e.task_id, e.error.to_string())),
                    None => error_open = false,
                },
            }
        }
        seen
    })
}

/// Shared counters for concurrency assertions.
#[derive(Debug, Default)]
pub struct Gauge {
    pub running: AtomicUsize,
    pub max_running: AtomicUsize,
    pub executions: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Configurable test task: emits `steps`, optionally waits on a gate or
/// sleeps, then succeeds or fails.
pub struct ScriptedTask {
    pub id: String,
    pub steps: Vec<String>,
    pub fail_with: Option<String>,
    pub gate: Option<Arc<Semaphore>>,
    pub delay: Option<Duration>,
    pub gauge: Option<Arc<Gauge>>,
    pub own_executions: Arc<AtomicUsize>,
}

impl ScriptedTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            fail_with: None,
            gate: None,
            delay: None,
            gauge: None,
            own_executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn steps(mut self, steps: &[&str]) -> Self {
        self.steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn gauged(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn boxed(self) -> BoxedTask {
        Box::new(self)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<()> {
        self.own_executions.fetch_add(1, Ordering::SeqCst);
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }

        for step in &self.steps {
            ctx.emit(step.clone()).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(gauge) = &self.gauge {
            gauge.leave();
        }
        match &self.fail_with {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}
