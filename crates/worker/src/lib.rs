//! Fixed-size asynchronous worker pool.
//!
//! A [`Dispatcher`] owns `N` workers and hands each submitted [`Task`] to
//! exactly one idle worker. Workers report progress and outcomes on three
//! aggregated streams ([`TaskEvents`]). [`NonBlockingDispatcher`] adds an
//! unbounded intake queue so submitters never wait for a free worker.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod nonblocking;
pub mod task;

mod worker;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherState, TaskDispatcher};
pub use error::DispatchError;
pub use nonblocking::NonBlockingDispatcher;
pub use task::{BoxedTask, Completion, Failure, StatusSink, Task, TaskContext, TaskEvents, TaskId, TaskStatus};
