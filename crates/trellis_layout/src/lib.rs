//! Trellis Layout
//!
//! The control tree and everything that positions it:
//!
//! - [`ControlTree`] - arena of controls, parent/child structure, lazily
//!   created native handlers and disposal
//! - Layout engine - docking, vertical/horizontal stacks and independent
//!   alignment, resolved by deferred layout passes
//! - Scroll viewports - content arranged against its unbounded size and
//!   shifted by the scroll offset
//! - [`ControlSlot`] - observable reference to a control
//!
//! # Example
//!
//! ```ignore
//! use trellis_layout::prelude::*;
//!
//! let mut tree = ControlTree::new(Arc::new(HeadlessBackend::new()));
//! let window = tree.create_control(ControlKind::Window);
//! tree.set_layout(window, LayoutStyle::Dock)?;
//! tree.set_bounds(window, Rect::new(0.0, 0.0, 100.0, 50.0))?;
//!
//! let sidebar = tree.create_control(ControlKind::Panel);
//! tree.set_dock(sidebar, Dock::Left)?;
//! tree.set_suggested_size(sidebar, SuggestedSize::width(20.0))?;
//! tree.add_child(window, sidebar)?;
//!
//! tree.run_layout_pass();
//! assert_eq!(tree.bounds(sidebar)?, Rect::new(0.0, 0.0, 20.0, 50.0));
//! ```

pub mod binding;
pub mod control;
mod engine;
pub mod error;
pub mod scheduler;
pub mod scroll;
pub mod tree;

pub use binding::ControlSlot;
pub use control::{
    BoundsChanged, ControlEvents, Dock, HandlerEvent, HorizontalAlignment, LayoutStyle,
    SuggestedSize, VerticalAlignment,
};
pub use error::{ControlError, Result};
pub use scheduler::{LayoutRequestHook, LayoutScheduler};
pub use scroll::ScrollInfo;
pub use tree::{ControlId, ControlTree, LayoutStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::binding::ControlSlot;
    pub use crate::control::{
        Dock, HorizontalAlignment, LayoutStyle, SuggestedSize, VerticalAlignment,
    };
    pub use crate::error::{ControlError, Result};
    pub use crate::scroll::ScrollInfo;
    pub use crate::tree::{ControlId, ControlTree};
    pub use trellis_core::{Point, Rect, Size, Thickness};
    pub use trellis_platform::{ControlKind, HandlerFactory, HeadlessBackend, NativeEvent};
}
