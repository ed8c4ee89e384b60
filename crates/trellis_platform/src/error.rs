//! Platform error types

use thiserror::Error;

/// Native peer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The handler was already disposed
    #[error("handler has been disposed")]
    Disposed,

    /// The operation needs an attached handler
    #[error("handler is not attached")]
    NotAttached,

    /// The factory could not create a native control
    #[error("failed to create native control: {0}")]
    CreateFailed(String),

    /// Disconnecting native callbacks failed
    #[error("failed to unwire native events: {0}")]
    Unwire(String),

    /// The backend does not provide this control kind
    #[error("native control not supported: {0}")]
    Unsupported(String),

    /// Generic platform error
    #[error("platform error: {0}")]
    Other(String),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
