//! Control tree error types

use crate::tree::ControlId;
use thiserror::Error;
use trellis_platform::PlatformError;

/// Control tree errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The control was disposed (or never belonged to this tree)
    #[error("control {0:?} has been disposed")]
    Disposed(ControlId),

    /// Adding the child would make a control its own ancestor
    #[error("adding this child would create a cycle")]
    WouldCreateCycle,

    /// The control is not a child of the given parent
    #[error("control is not a child of this parent")]
    NotAChild,

    /// `resume_layout` without a matching `suspend_layout`
    #[error("layout is not suspended")]
    LayoutNotSuspended,

    /// Native peer failure
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for control tree operations
pub type Result<T> = std::result::Result<T, ControlError>;
