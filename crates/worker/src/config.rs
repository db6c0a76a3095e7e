//! Worker pool configuration.

use std::time::Duration;

/// Number of workers when `WORKER_COUNT` is unset.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Worker pool configuration loaded from environment variables.
///
/// | Env var               | Default | Meaning                                        |
/// |-----------------------|---------|------------------------------------------------|
/// | `WORKER_COUNT`        | `10`    | Fixed number of workers (minimum 1)            |
/// | `TASK_TIMEOUT_SECS`   | unset   | Fail a task that runs longer than this          |
/// | `SHUTDOWN_GRACE_SECS` | unset   | Cancel in-flight tasks this long after stop    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub task_timeout: Option<Duration>,
    pub shutdown_grace: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            task_timeout: None,
            shutdown_grace: None,
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from environment variables.
    ///
    /// Panics on malformed values, like the rest of startup configuration.
    pub fn from_env() -> Self {
        let workers: usize = std::env::var("WORKER_COUNT")
            .map(|v| v.parse().expect("WORKER_COUNT must be a valid usize"))
            .unwrap_or(DEFAULT_WORKER_COUNT);

        let task_timeout = secs_from_env("TASK_TIMEOUT_SECS");
        let shutdown_grace = secs_from_env("SHUTDOWN_GRACE_SECS");

        Self::default()
            .with_workers(workers)
            .with_task_timeout(task_timeout)
            .with_shutdown_grace(shutdown_grace)
    }

    /// Set the pool size. Zero is raised to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Option<Duration>) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key).ok().map(|v| {
        let secs: u64 = v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid u64"));
        Duration::from_secs(secs)
    })
}
