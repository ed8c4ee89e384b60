//! Observable control references
//!
//! A [`ControlSlot`] is a [`ValueSource`] holding an optional [`ControlId`]
//! that stays in step with the control it refers to: subscribers are told
//! again once the control's handler is created (so they can reach the native
//! peer), and the slot empties itself when the control is disposed.

use crate::error::Result;
use crate::tree::{ControlId, ControlTree};
use trellis_core::{SubscriptionId, ValueSource};

struct Watch {
    control: ControlId,
    created: SubscriptionId,
    disposed: SubscriptionId,
}

/// Observable `Option<ControlId>` tied to the referenced control's lifetime
#[derive(Default)]
pub struct ControlSlot {
    source: ValueSource<Option<ControlId>>,
    watch: Option<Watch>,
}

impl ControlSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<ControlId> {
        self.source.get()
    }

    /// Underlying value source, for sharing with other observers
    pub fn source(&self) -> &ValueSource<Option<ControlId>> {
        &self.source
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Option<ControlId>) + Send + Sync + 'static,
    {
        self.source.subscribe(callback)
    }

    /// Point the slot at `control`, watching its handler and disposal.
    ///
    /// Returns whether the value changed. A disposed control is rejected.
    pub fn set(&mut self, tree: &mut ControlTree, control: Option<ControlId>) -> Result<bool> {
        if control == self.get() {
            return Ok(false);
        }
        if let Some(id) = control {
            tree.node(id)?;
        }

        self.unwatch(tree);
        if let Some(id) = control {
            let events = tree.events(id)?;
            let source = self.source.clone();
            let created = events.handler_created.subscribe(move |event| {
                if source.get() == Some(event.control) {
                    source.notify();
                }
            });
            let source = self.source.clone();
            let disposed = events.disposed.subscribe(move |id| {
                if source.get() == Some(*id) {
                    source.set(None);
                }
            });
            self.watch = Some(Watch {
                control: id,
                created,
                disposed,
            });
        }
        Ok(self.source.set(control))
    }

    /// Empty the slot
    pub fn clear(&mut self, tree: &mut ControlTree) -> bool {
        self.unwatch(tree);
        self.source.set(None)
    }

    fn unwatch(&mut self, tree: &mut ControlTree) {
        let Some(watch) = self.watch.take() else {
            return;
        };
        // The control may already be gone, taking its event lists with it
        if let Ok(events) = tree.events(watch.control) {
            events.handler_created.unsubscribe(watch.created);
            events.disposed.unsubscribe(watch.disposed);
        }
    }
}

impl std::fmt::Debug for ControlSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlSlot")
            .field("control", &self.get())
            .finish()
    }
}
