//! Deferred layout requests
//!
//! Property changes never lay out synchronously. They mark controls dirty and
//! ask for one deferred pass through the request hook (in an application the
//! hook posts a job onto the UI dispatcher). Any number of invalidations
//! between passes cost one pass, and a request made while a pass is running
//! is held until that pass ends.

use crate::tree::ControlId;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

/// Called when the scheduler wants a layout pass to be run
pub type LayoutRequestHook = Arc<dyn Fn() + Send + Sync>;

/// Dirty set plus request coalescing for one control tree
#[derive(Default)]
pub struct LayoutScheduler {
    dirty: Vec<ControlId>,
    dirty_set: FxHashSet<ControlId>,
    /// A pass has been requested and has not started yet
    requested: bool,
    in_pass: bool,
    hook: Option<LayoutRequestHook>,
}

impl LayoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hook(&mut self, hook: Option<LayoutRequestHook>) {
        self.hook = hook;
    }

    /// Add `id` to the dirty set and request a pass
    pub fn invalidate(&mut self, id: ControlId) {
        if self.dirty_set.insert(id) {
            self.dirty.push(id);
        }
        self.request();
    }

    pub fn is_dirty(&self, id: ControlId) -> bool {
        self.dirty_set.contains(&id)
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn in_pass(&self) -> bool {
        self.in_pass
    }

    /// Forget a control that left the tree
    pub fn remove(&mut self, id: ControlId) {
        if self.dirty_set.remove(&id) {
            self.dirty.retain(|existing| *existing != id);
        }
    }

    /// Start a pass, taking the dirty set in invalidation order.
    ///
    /// Returns `None` if a pass is already running.
    pub fn begin_pass(&mut self) -> Option<Vec<ControlId>> {
        if self.in_pass {
            return None;
        }
        self.in_pass = true;
        self.requested = false;
        self.dirty_set.clear();
        Some(std::mem::take(&mut self.dirty))
    }

    /// Finish the running pass; requests the next one if anything was
    /// invalidated meanwhile.
    pub fn end_pass(&mut self) {
        self.in_pass = false;
        if self.has_dirty() {
            self.request();
        }
    }

    fn request(&mut self) {
        if self.requested || self.in_pass {
            return;
        }
        self.requested = true;
        if let Some(hook) = &self.hook {
            hook();
        }
    }
}

impl fmt::Debug for LayoutScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutScheduler")
            .field("dirty", &self.dirty.len())
            .field("requested", &self.requested)
            .field("in_pass", &self.in_pass)
            .finish()
    }
}
