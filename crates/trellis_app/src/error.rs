//! Error types for trellis_app

use thiserror::Error;
use trellis_layout::ControlError;
use trellis_platform::PlatformError;
use trellis_runtime::{DispatchError, QueueError};

/// Errors that can occur in a Trellis application
#[derive(Error, Debug)]
pub enum AppError {
    /// Control tree operation failed
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Native peer failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Marshaling onto the UI thread failed
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Background queue failure
    #[error("Task queue error: {0}")]
    Queue(#[from] QueueError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type for trellis_app operations
pub type Result<T> = std::result::Result<T, AppError>;
