//! Native peer traits
//!
//! A backend provides a [`HandlerFactory`] that produces one [`NativeControl`]
//! per attachment cycle of a control. The control tree never talks to a
//! native control directly; it goes through a
//! [`ControlHandler`](crate::handler::ControlHandler), which owns the peer and
//! enforces its lifecycle.

use crate::error::Result;
use crate::event::EventRelay;
use std::fmt;
use trellis_core::{Rect, Size};

/// Which native peer a control wants
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Plain layout container without native chrome
    #[default]
    Container,
    /// Top-level window
    Window,
    /// Bordered panel
    Panel,
    /// Scrollable viewport
    ScrollViewer,
    Label,
    Button,
    TextBox,
    CheckBox,
    /// Backend-defined control, identified by name
    Custom(&'static str),
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::Custom(name) => write!(f, "custom:{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A platform widget bound to one control
///
/// Implementations forward geometry and state to the platform and report
/// native callbacks through the relay handed to [`NativeControl::connect`].
/// `release` is called exactly once by the owning handler; no other method is
/// called afterwards.
pub trait NativeControl {
    /// Current native bounds in parent space
    fn bounds(&self) -> Rect;

    /// Move and resize the native widget
    fn set_bounds(&mut self, bounds: Rect);

    /// Start relaying native callbacks
    fn connect(&mut self, relay: EventRelay);

    /// Stop relaying native callbacks
    fn disconnect(&mut self) -> Result<()>;

    /// Natural size of the widget's own content, given the space on offer
    fn preferred_size(&self, available: Size) -> Size;

    fn set_visible(&mut self, visible: bool);

    fn set_enabled(&mut self, enabled: bool);

    /// Mark the widget for repaint
    fn invalidate(&mut self);

    /// Repaint now if invalid
    fn update(&mut self);

    /// Free the native resource
    fn release(&mut self);
}

/// Creates native controls for a backend
pub trait HandlerFactory {
    /// Backend name, used in logs
    fn name(&self) -> &str;

    /// Create the native peer for `kind`
    fn create_native_control(&self, kind: &ControlKind) -> Result<Box<dyn NativeControl>>;
}
