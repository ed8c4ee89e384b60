//! Trellis Application Framework
//!
//! One entry point for a Trellis UI: the control tree, the UI-thread
//! dispatcher that serializes all access to it, and a background task queue.
//!
//! # Example
//!
//! ```ignore
//! use trellis_app::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = AppConfig::from_toml_str(include_str!("trellis.toml"))?;
//!     let mut app = App::new(config, Arc::new(HeadlessBackend::new()))?;
//!
//!     let sidebar = app.tree_mut().create_control(ControlKind::Panel);
//!     app.tree_mut().set_dock(sidebar, Dock::Left)?;
//!     app.tree_mut().set_suggested_size(sidebar, SuggestedSize::width(200.0))?;
//!     app.tree_mut().add_child(app.root(), sidebar)?;
//!
//!     let handle = app.handle();
//!     handle.spawn(move || {
//!         let items = load_items()?;
//!         handle.begin_invoke(move |tree| populate(tree, sidebar, items))?;
//!         Ok(())
//!     })?;
//!
//!     app.run_until(|_| ControlFlow::Continue);
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod error;
pub mod logging;


pub use app::{App, AppHandle};
pub use config::AppConfig;
pub use error::{AppError, Result};

// Re-export the layer APIs for convenience
pub use trellis_layout::prelude::*;
pub use trellis_platform::ControlFlow;
pub use trellis_runtime::{DispatchError, FailureReporter, QueueError, TaskFailure};

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::app::{App, AppHandle};
    pub use crate::config::AppConfig;
    pub use crate::error::{AppError, Result};

    // Tree and layout
    pub use trellis_layout::prelude::*;

    // Platform types
    pub use trellis_platform::{ControlFlow, NativeEvent};

    // Runtime types
    pub use trellis_runtime::{DispatchError, FailureKind, QueueError, TaskFailure};

    pub use std::sync::Arc;
}
