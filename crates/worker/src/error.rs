use crate::dispatcher::DispatcherState;

/// Errors returned by the dispatcher lifecycle and intake operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatcher has already been started")]
    AlreadyStarted,

    #[error("Dispatcher is not running (state: {0})")]
    NotRunning(DispatcherState),

    #[error("Dispatcher intake is closed")]
    Closed,
}
