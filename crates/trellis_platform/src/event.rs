//! Native events and the relay that carries them to the UI run loop
//!
//! Native peers never call back into the control tree directly. Each attached
//! handler gets an [`EventRelay`]; the peer calls [`EventRelay::emit`] and the
//! relay posts a [`PeerMessage`] through its sink (normally a deferred job on
//! the UI dispatcher). Messages carry the handler generation so the tree can
//! drop anything sent by a peer that has since been replaced.

use crate::input::InputEvent;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trellis_core::Size;

/// Control flow after one run-loop iteration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControlFlow {
    /// Continue running the loop
    #[default]
    Continue,
    /// Exit the loop
    Exit,
}

/// Event raised by a native peer
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    /// Mouse, keyboard or wheel input
    Input(InputEvent),
    /// The peer was resized by the native side
    Resized(Size),
    /// Focus gained or lost
    Focus(bool),
    /// The peer's primary action fired (button click, menu activation)
    Activated,
    /// The native scroll position moved
    Scrolled { x: f32, y: f32 },
    /// Backend-specific notification
    Custom(String),
}

/// A native event addressed to one control's attachment cycle
#[derive(Clone, Debug, PartialEq)]
pub struct PeerMessage {
    /// Opaque control key, see [`EventRelay::target`]
    pub target: u64,
    /// Handler generation that produced the event
    pub generation: u64,
    pub event: NativeEvent,
}

/// Where relayed messages go
pub type RelaySink = Arc<dyn Fn(PeerMessage) + Send + Sync>;

/// Connection from one native peer back to the UI run loop
///
/// Cloning is cheap; every clone observes the same live flag, which the
/// owning handler clears before it detaches or disposes.
#[derive(Clone)]
pub struct EventRelay {
    target: u64,
    generation: u64,
    live: Arc<AtomicBool>,
    sink: RelaySink,
}

impl EventRelay {
    pub fn new(target: u64, generation: u64, live: Arc<AtomicBool>, sink: RelaySink) -> Self {
        Self {
            target,
            generation,
            live,
            sink,
        }
    }

    /// Control key this relay reports for
    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Post `event` to the run loop. Returns false once the handler has been
    /// detached or disposed, in which case nothing is posted.
    pub fn emit(&self, event: NativeEvent) -> bool {
        if !self.is_live() {
            return false;
        }
        (self.sink)(PeerMessage {
            target: self.target,
            generation: self.generation,
            event,
        });
        true
    }
}

impl fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRelay")
            .field("target", &self.target)
            .field("generation", &self.generation)
            .field("live", &self.is_live())
            .finish()
    }
}
