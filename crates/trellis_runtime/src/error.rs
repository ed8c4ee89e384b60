//! Runtime error types

use thiserror::Error;

/// Errors from marshaling work onto the UI thread
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// A blocking invoke was attempted on the UI thread itself
    #[error("blocking invoke called on the UI thread")]
    WouldBlockUiThread,

    /// The dispatcher shut down before the job ran
    #[error("dispatcher has shut down")]
    Shutdown,
}

/// Errors from the background task queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue already has its consumer
    #[error("task queue consumer already running")]
    AlreadyRunning,

    /// The queue was cancelled and accepts no more work
    #[error("task queue has been cancelled")]
    Cancelled,

    /// The consumer thread could not be started
    #[error("failed to spawn task queue thread: {0}")]
    Spawn(String),
}

/// Result type for dispatcher operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Result type for task queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
