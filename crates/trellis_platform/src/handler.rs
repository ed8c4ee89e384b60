//! Handler lifecycle
//!
//! A [`ControlHandler`] owns exactly one native peer for one attachment cycle:
//!
//! ```text
//! Detached ──attach──▶ Attached ──detach──▶ Detached
//!     │                    │
//!     └──────dispose───────┴──────▶ Disposed (terminal)
//! ```
//!
//! Disposal always disconnects native callbacks before releasing the native
//! resource, and releases it even when disconnecting fails. The relay's live
//! flag is cleared before anything else so no callback can be posted after
//! the transition.

use crate::error::{PlatformError, Result};
use crate::event::{EventRelay, RelaySink};
use crate::native::{ControlKind, NativeControl};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trellis_core::{Rect, Size};

/// Lifecycle state of a handler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HandlerState {
    /// Native peer exists but no callbacks are wired
    #[default]
    Detached,
    /// Native callbacks are wired to the run loop
    Attached,
    /// Native resource released; terminal
    Disposed,
}

/// Binding between one control and its native peer
pub struct ControlHandler {
    native: Box<dyn NativeControl>,
    kind: ControlKind,
    state: HandlerState,
    /// Attachment cycle counter of the owning control
    generation: u64,
    /// Shared with every relay handed to the peer
    live: Arc<AtomicBool>,
}

impl ControlHandler {
    /// Wrap a freshly created native peer. The handler starts detached.
    pub fn new(native: Box<dyn NativeControl>, kind: ControlKind, generation: u64) -> Self {
        Self {
            native,
            kind,
            state: HandlerState::Detached,
            generation,
            live: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_attached(&self) -> bool {
        self.state == HandlerState::Attached
    }

    pub fn is_disposed(&self) -> bool {
        self.state == HandlerState::Disposed
    }

    /// Wire native callbacks to `sink`, tagging messages with `target`.
    ///
    /// Attaching an attached handler does nothing.
    pub fn attach(&mut self, target: u64, sink: RelaySink) -> Result<()> {
        match self.state {
            HandlerState::Attached => return Ok(()),
            HandlerState::Disposed => return Err(PlatformError::Disposed),
            HandlerState::Detached => {}
        }

        self.live = Arc::new(AtomicBool::new(true));
        let relay = EventRelay::new(target, self.generation, Arc::clone(&self.live), sink);
        self.native.connect(relay);
        self.state = HandlerState::Attached;
        tracing::debug!(kind = %self.kind, generation = self.generation, "handler attached");
        Ok(())
    }

    /// Unwire native callbacks. Detaching a detached or disposed handler does
    /// nothing.
    pub fn detach(&mut self) -> Result<()> {
        if self.state != HandlerState::Attached {
            return Ok(());
        }

        self.live.store(false, Ordering::Release);
        self.state = HandlerState::Detached;
        tracing::debug!(kind = %self.kind, generation = self.generation, "handler detached");
        self.native.disconnect().map_err(unwire_error)
    }

    /// Unwire and release the native peer. Later calls do nothing.
    ///
    /// The native resource is released even if unwiring fails; the unwire
    /// failure is then returned.
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == HandlerState::Disposed {
            return Ok(());
        }

        self.live.store(false, Ordering::Release);
        let unwired = if self.state == HandlerState::Attached {
            self.native.disconnect()
        } else {
            Ok(())
        };
        self.state = HandlerState::Disposed;
        self.native.release();
        tracing::debug!(kind = %self.kind, generation = self.generation, "handler disposed");

        unwired.map_err(|err| {
            let err = unwire_error(err);
            tracing::warn!(kind = %self.kind, error = %err, "native peer released after unwire failure");
            err
        })
    }

    // ========================================================================
    // Forwarded properties
    // ========================================================================

    pub fn bounds(&self) -> Result<Rect> {
        self.ensure_alive()?;
        Ok(self.native.bounds())
    }

    pub fn set_bounds(&mut self, bounds: Rect) -> Result<()> {
        self.ensure_alive()?;
        self.native.set_bounds(bounds);
        Ok(())
    }

    pub fn preferred_size(&self, available: Size) -> Result<Size> {
        self.ensure_alive()?;
        Ok(self.native.preferred_size(available).sanitized())
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.ensure_alive()?;
        self.native.set_visible(visible);
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_alive()?;
        self.native.set_enabled(enabled);
        Ok(())
    }

    pub fn invalidate(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.native.invalidate();
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.native.update();
        Ok(())
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state == HandlerState::Disposed {
            Err(PlatformError::Disposed)
        } else {
            Ok(())
        }
    }
}

fn unwire_error(err: PlatformError) -> PlatformError {
    match err {
        PlatformError::Unwire(_) => err,
        other => PlatformError::Unwire(other.to_string()),
    }
}

impl Drop for ControlHandler {
    fn drop(&mut self) {
        if self.state != HandlerState::Disposed {
            let _ = self.dispose();
        }
    }
}

impl fmt::Debug for ControlHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlHandler")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}
