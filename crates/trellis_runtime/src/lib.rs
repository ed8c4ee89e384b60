//! Trellis Runtime
//!
//! Threading support for Trellis applications:
//!
//! - [`Dispatcher`] / [`DispatcherHandle`] - marshal work onto the UI thread,
//!   either blocking for a result (`invoke`) or fire-and-forget
//!   (`begin_invoke`)
//! - [`TaskQueue`] - single-consumer background queue for closures and
//!   futures, with failures routed to a [`FailureReporter`]

pub mod dispatcher;
pub mod error;
pub mod task_queue;

pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{DispatchError, DispatchResult, QueueError, QueueResult};
pub use task_queue::{
    log_failures, FailureKind, FailureReporter, TaskFailure, TaskQueue, TaskSender,
};

use std::any::Any;

/// Text of a panic payload, for logging
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
