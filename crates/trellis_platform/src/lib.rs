//! Trellis Platform Abstraction Layer
//!
//! This crate defines how controls bind to native widgets ("peers") without
//! knowing which platform provides them.
//!
//! # Architecture
//!
//! - [`HandlerFactory`] - backend entry point, creates one peer per attachment
//! - [`NativeControl`] - the peer itself: geometry, state, repaint, release
//! - [`ControlHandler`] - owns a peer and enforces the
//!   `Detached → Attached → Disposed` lifecycle
//! - [`EventRelay`] - carries native callbacks back to the UI run loop as
//!   [`PeerMessage`]s
//!
//! # Backends
//!
//! - [`headless`] - in-memory peers for tests and offscreen layout
//!
//! # Example
//!
//! ```ignore
//! use trellis_platform::prelude::*;
//!
//! let backend = HeadlessBackend::new();
//! let native = backend.create_native_control(&ControlKind::Button)?;
//! let mut handler = ControlHandler::new(native, ControlKind::Button, 1);
//! handler.attach(target, sink)?;
//! handler.dispose()?;
//! ```

mod error;
mod event;
pub mod handler;
pub mod headless;
mod input;
mod native;

// Re-export all public types
pub use error::{PlatformError, Result};
pub use event::{ControlFlow, EventRelay, NativeEvent, PeerMessage, RelaySink};
pub use handler::{ControlHandler, HandlerState};
pub use headless::{HeadlessBackend, HeadlessPeer};
pub use input::{InputEvent, Key, KeyState, KeyboardEvent, Modifiers, MouseButton, MouseEvent};
pub use native::{ControlKind, HandlerFactory, NativeControl};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PlatformError, Result};
    pub use crate::event::{ControlFlow, EventRelay, NativeEvent, PeerMessage, RelaySink};
    pub use crate::handler::{ControlHandler, HandlerState};
    pub use crate::headless::{HeadlessBackend, HeadlessPeer};
    pub use crate::input::{
        InputEvent, Key, KeyState, KeyboardEvent, Modifiers, MouseButton, MouseEvent,
    };
    pub use crate::native::{ControlKind, HandlerFactory, NativeControl};
}
