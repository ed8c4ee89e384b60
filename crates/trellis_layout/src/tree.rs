//! Control tree
//!
//! All controls live in one [`SlotMap`] arena owned by the [`ControlTree`].
//! Children are owned through ordered `Vec<ControlId>` lists (insertion order
//! is z-order and traversal order); the parent link is a plain arena index.
//!
//! The tree is bound to the UI thread: it holds native handlers and
//! single-threaded event callbacks, so it is neither `Send` nor `Sync`.
//! Other threads reach it through the dispatcher.
//!
//! ```ignore
//! let mut tree = ControlTree::new(Arc::new(HeadlessBackend::new()));
//! let root = tree.create_control(ControlKind::Window);
//! let button = tree.create_control(ControlKind::Button);
//! tree.add_child(root, button)?;
//! tree.set_bounds(root, Rect::new(0.0, 0.0, 640.0, 480.0))?;
//! tree.run_layout_pass();
//! ```

use crate::control::{
    BoundsChanged, ControlEvents, ControlNode, Dock, HandlerEvent, HorizontalAlignment,
    LayoutStyle, SuggestedSize, VerticalAlignment,
};
use crate::error::{ControlError, Result};
use crate::scheduler::{LayoutRequestHook, LayoutScheduler};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use slotmap::{new_key_type, Key, SlotMap};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use trellis_core::{Point, Rect, Size, Thickness};
use trellis_platform::{
    ControlHandler, ControlKind, HandlerFactory, HandlerState, NativeEvent, PeerMessage,
    RelaySink,
};

new_key_type! {
    pub struct ControlId;
}

impl ControlId {
    /// Convert to a raw u64 representation
    ///
    /// This is the target carried by native peer messages.
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Create from a raw u64 representation
    ///
    /// A value that never came from `to_raw` yields an id no tree contains.
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Layout diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutStats {
    /// Layout passes run
    pub passes: u64,
    /// Preferred-size computations, across all controls
    pub measure_calls: u64,
}

/// Arena of controls plus the state shared by all of them
pub struct ControlTree {
    pub(crate) nodes: SlotMap<ControlId, ControlNode>,
    default_factory: Arc<dyn HandlerFactory>,
    pub(crate) scheduler: LayoutScheduler,
    sink: RelaySink,
    inbox: Arc<Mutex<VecDeque<PeerMessage>>>,
    pub(crate) passes: Cell<u64>,
    pub(crate) measure_calls: Cell<u64>,
}

impl ControlTree {
    /// Create an empty tree whose handlers come from `default_factory`.
    ///
    /// Native events are queued in an internal inbox until
    /// [`ControlTree::process_native_messages`] is called, unless a sink is
    /// installed with [`ControlTree::set_relay_sink`].
    pub fn new(default_factory: Arc<dyn HandlerFactory>) -> Self {
        let inbox: Arc<Mutex<VecDeque<PeerMessage>>> = Arc::default();
        let queued = Arc::clone(&inbox);
        Self {
            nodes: SlotMap::with_key(),
            default_factory,
            scheduler: LayoutScheduler::new(),
            sink: Arc::new(move |msg| queued.lock().push_back(msg)),
            inbox,
            passes: Cell::new(0),
            measure_calls: Cell::new(0),
        }
    }

    /// Route native messages from handlers created from now on
    pub fn set_relay_sink(&mut self, sink: RelaySink) {
        self.sink = sink;
    }

    /// Install the callback used to request deferred layout passes
    pub fn set_layout_request_hook(&mut self, hook: Option<LayoutRequestHook>) {
        self.scheduler.set_hook(hook);
    }

    pub fn default_factory(&self) -> &Arc<dyn HandlerFactory> {
        &self.default_factory
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Create a detached, parentless control
    pub fn create_control(&mut self, kind: ControlKind) -> ControlId {
        let id = self.nodes.insert(ControlNode::new(kind));
        tracing::trace!(?id, "control created");
        id
    }

    /// False once the control is disposed
    pub fn contains(&self, id: ControlId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_disposed(&self, id: ControlId) -> bool {
        !self.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node(&self, id: ControlId) -> Result<&ControlNode> {
        self.nodes.get(id).ok_or(ControlError::Disposed(id))
    }

    pub(crate) fn node_mut(&mut self, id: ControlId) -> Result<&mut ControlNode> {
        self.nodes.get_mut(id).ok_or(ControlError::Disposed(id))
    }

    pub fn parent(&self, id: ControlId) -> Result<Option<ControlId>> {
        Ok(self.node(id)?.parent)
    }

    /// Children in z-order
    pub fn children(&self, id: ControlId) -> Result<&[ControlId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn kind(&self, id: ControlId) -> Result<&ControlKind> {
        Ok(&self.node(id)?.kind)
    }

    pub fn name(&self, id: ControlId) -> Result<Option<&str>> {
        Ok(self.node(id)?.name.as_deref())
    }

    pub fn set_name(&mut self, id: ControlId, name: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.name = Some(name.into());
        Ok(())
    }

    /// Topmost ancestor (the control itself when it has no parent)
    pub fn root_of(&self, id: ControlId) -> Result<ControlId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// True if `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: ControlId, id: ControlId) -> bool {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|node| node.parent);
        }
        false
    }

    /// Append `child` to `parent`'s children, moving it from any previous parent
    pub fn add_child(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        let index = self.node(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` at `index` (clamped) among `parent`'s children
    pub fn insert_child(&mut self, parent: ControlId, index: usize, child: ControlId) -> Result<()> {
        self.node(parent)?;
        let old_parent = self.node(child)?.parent;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(ControlError::WouldCreateCycle);
        }

        if let Some(old) = old_parent {
            if let Some(node) = self.nodes.get_mut(old) {
                node.children.retain(|existing| *existing != child);
            }
            if old != parent {
                self.invalidate_layout_chain(old);
            }
        }

        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);

        self.refresh_factories(child);
        self.invalidate_layout_chain(child);
        tracing::trace!(?parent, ?child, index, "child inserted");
        Ok(())
    }

    /// Detach `child` from `parent`. The child keeps its handler.
    pub fn remove_child(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(ControlError::NotAChild);
        }

        self.node_mut(parent)?.children.retain(|existing| *existing != child);
        self.node_mut(child)?.parent = None;
        self.invalidate_layout_chain(parent);
        Ok(())
    }

    /// Dispose `id` and its whole subtree, children before parents.
    ///
    /// Disposing an already-disposed control does nothing. Every handler in
    /// the subtree is released even if some fail to unwire; the first such
    /// failure is returned afterwards.
    pub fn dispose(&mut self, id: ControlId) -> Result<()> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };

        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|existing| *existing != id);
            }
            self.invalidate_layout_chain(parent);
        }

        let mut first_error = None;
        self.dispose_subtree(id, &mut first_error);
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispose_subtree(&mut self, id: ControlId, first_error: &mut Option<ControlError>) {
        let children = self
            .nodes
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            self.dispose_subtree(child, first_error);
        }

        if let Err(err) = self.release_handler(id) {
            first_error.get_or_insert(err);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.events.disposed.emit(&id);
        }
        self.scheduler.remove(id);
        self.nodes.remove(id);
        tracing::debug!(?id, "control disposed");
    }

    /// Event lists for `id`
    pub fn events(&mut self, id: ControlId) -> Result<&mut ControlEvents> {
        Ok(&mut self.node_mut(id)?.events)
    }

    fn subtree(&self, id: ControlId) -> Vec<ControlId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// The control's handler, created on first access
    pub fn handler(&mut self, id: ControlId) -> Result<&mut ControlHandler> {
        self.ensure_handler(id)?;
        self.node_mut(id)?
            .handler
            .handler
            .as_mut()
            .ok_or(ControlError::Disposed(id))
    }

    pub fn has_handler(&self, id: ControlId) -> Result<bool> {
        Ok(self.node(id)?.handler.handler.is_some())
    }

    /// `Detached` when no handler exists yet
    pub fn handler_state(&self, id: ControlId) -> Result<HandlerState> {
        Ok(self
            .node(id)?
            .handler
            .handler
            .as_ref()
            .map(|handler| handler.state())
            .unwrap_or(HandlerState::Detached))
    }

    /// Number of attachment cycles started for the control
    pub fn handler_generation(&self, id: ControlId) -> Result<u64> {
        Ok(self.node(id)?.handler.generation)
    }

    /// Factory override for `id` and its descendants; `None` inherits again.
    ///
    /// Handlers in the subtree made by a different factory are released and
    /// re-created on the next layout.
    pub fn set_handler_factory(
        &mut self,
        id: ControlId,
        factory: Option<Arc<dyn HandlerFactory>>,
    ) -> Result<()> {
        self.node_mut(id)?.factory_override = factory;
        self.refresh_factories(id);
        self.invalidate_layout_chain(id);
        Ok(())
    }

    /// Nearest factory override on `id` or its ancestors, else the default
    pub fn effective_factory(&self, id: ControlId) -> Result<Arc<dyn HandlerFactory>> {
        let mut current = Some(id);
        while let Some(control) = current {
            let node = self.node(control)?;
            if let Some(factory) = &node.factory_override {
                return Ok(Arc::clone(factory));
            }
            current = node.parent;
        }
        Ok(Arc::clone(&self.default_factory))
    }

    /// Dispose the current handler (if any) and start a new attachment cycle
    pub fn recreate_handler(&mut self, id: ControlId) -> Result<()> {
        self.node(id)?;
        let released = self.release_handler(id);
        self.ensure_handler(id)?;
        released
    }

    pub(crate) fn ensure_handler(&mut self, id: ControlId) -> Result<()> {
        let node = self.node(id)?;
        if node.handler.handler.is_some() {
            return Ok(());
        }
        let kind = node.kind.clone();
        let factory = self.effective_factory(id)?;
        let native = factory.create_native_control(&kind)?;
        let sink = Arc::clone(&self.sink);

        let node = self.node_mut(id)?;
        node.handler.generation += 1;
        let mut handler = ControlHandler::new(native, kind.clone(), node.handler.generation);
        handler.attach(id.to_raw(), sink)?;
        handler.set_bounds(node.bounds)?;
        handler.set_visible(node.visible)?;
        handler.set_enabled(node.enabled)?;

        let event = HandlerEvent {
            control: id,
            generation: handler.generation(),
            kind,
        };
        node.handler.handler = Some(handler);
        node.handler.factory = Some(Arc::clone(&factory));
        node.events.handler_created.emit(&event);
        tracing::debug!(?id, factory = factory.name(), generation = event.generation, "handler created");
        Ok(())
    }

    /// Detach and dispose the handler, if any
    pub(crate) fn release_handler(&mut self, id: ControlId) -> Result<()> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        let Some(mut handler) = node.handler.handler.take() else {
            return Ok(());
        };
        node.handler.factory = None;

        let result = handler.dispose();
        let event = HandlerEvent {
            control: id,
            generation: handler.generation(),
            kind: handler.kind().clone(),
        };
        node.events.handler_destroyed.emit(&event);
        result.map_err(ControlError::from)
    }

    /// Release handlers in `root`'s subtree whose factory is no longer the
    /// effective one
    fn refresh_factories(&mut self, root: ControlId) {
        for id in self.subtree(root) {
            let Some(current) = self.nodes.get(id).and_then(|n| n.handler.factory.clone()) else {
                continue;
            };
            let Ok(effective) = self.effective_factory(id) else {
                continue;
            };
            if !same_factory(&current, &effective) {
                tracing::debug!(?id, from = current.name(), to = effective.name(), "handler factory changed");
                if let Err(err) = self.release_handler(id) {
                    tracing::warn!(?id, error = %err, "releasing handler for factory change");
                }
            }
        }
    }

    // ========================================================================
    // Native messages
    // ========================================================================

    /// Deliver one relayed native event.
    ///
    /// Returns false (dropping the message) when the control is gone or the
    /// message came from an earlier attachment cycle.
    pub fn deliver_native(&mut self, msg: PeerMessage) -> bool {
        let id = ControlId::from_raw(msg.target);
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::debug!(raw_id = msg.target, "dropping native event for disposed control");
            return false;
        };
        let live_generation = node
            .handler
            .handler
            .as_ref()
            .filter(|handler| handler.is_attached())
            .map(|handler| handler.generation());
        if live_generation != Some(msg.generation) {
            tracing::debug!(?id, generation = msg.generation, "dropping stale native event");
            return false;
        }

        node.events.native.emit(&msg.event);
        if let NativeEvent::Scrolled { x, y } = msg.event {
            if node.layout == LayoutStyle::Scroll {
                if let Err(err) = self.scroll_to(id, Point::new(x, y)) {
                    tracing::warn!(?id, error = %err, "applying native scroll position");
                }
            }
        }
        true
    }

    /// Deliver everything queued in the internal inbox; returns how many
    /// messages were delivered
    pub fn process_native_messages(&mut self) -> usize {
        let pending: Vec<PeerMessage> = self.inbox.lock().drain(..).collect();
        let mut delivered = 0;
        for msg in pending {
            if self.deliver_native(msg) {
                delivered += 1;
            }
        }
        delivered
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn bounds(&self, id: ControlId) -> Result<Rect> {
        Ok(self.node(id)?.bounds)
    }

    /// Move/resize a control. A size change re-arranges its children.
    pub fn set_bounds(&mut self, id: ControlId, bounds: Rect) -> Result<()> {
        let old = self.node(id)?.bounds;
        if self.apply_bounds(id, bounds) && old.size != bounds.sanitized().size {
            self.invalidate_layout_chain(id);
        }
        Ok(())
    }

    /// Store resolved bounds, push them to the peer and raise `bounds_changed`
    pub(crate) fn apply_bounds(&mut self, id: ControlId, bounds: Rect) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let bounds = bounds.sanitized();
        if node.bounds == bounds {
            return false;
        }
        let old = node.bounds;
        node.bounds = bounds;
        if let Some(handler) = node.handler.handler.as_mut() {
            if let Err(err) = handler.set_bounds(bounds) {
                tracing::warn!(?id, error = %err, "pushing bounds to native peer");
            }
        }
        node.events
            .bounds_changed
            .emit(&BoundsChanged { old, new: bounds });
        true
    }

    /// Client rect deflated by padding, in the control's own coordinates
    pub fn children_layout_bounds(&self, id: ControlId) -> Result<Rect> {
        Ok(self.node(id)?.children_layout_bounds())
    }

    fn set_layout_property<T: PartialEq>(
        &mut self,
        id: ControlId,
        value: T,
        field: impl FnOnce(&mut ControlNode) -> &mut T,
    ) -> Result<bool> {
        let slot = field(self.node_mut(id)?);
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        self.invalidate_layout_chain(id);
        Ok(true)
    }

    pub fn margin(&self, id: ControlId) -> Result<Thickness> {
        Ok(self.node(id)?.margin)
    }

    pub fn set_margin(&mut self, id: ControlId, margin: Thickness) -> Result<()> {
        self.set_layout_property(id, margin, |n| &mut n.margin).map(drop)
    }

    pub fn padding(&self, id: ControlId) -> Result<Thickness> {
        Ok(self.node(id)?.padding)
    }

    pub fn set_padding(&mut self, id: ControlId, padding: Thickness) -> Result<()> {
        self.set_layout_property(id, padding, |n| &mut n.padding).map(drop)
    }

    pub fn horizontal_alignment(&self, id: ControlId) -> Result<HorizontalAlignment> {
        Ok(self.node(id)?.horizontal_alignment)
    }

    pub fn set_horizontal_alignment(
        &mut self,
        id: ControlId,
        alignment: HorizontalAlignment,
    ) -> Result<()> {
        self.set_layout_property(id, alignment, |n| &mut n.horizontal_alignment)
            .map(drop)
    }

    pub fn vertical_alignment(&self, id: ControlId) -> Result<VerticalAlignment> {
        Ok(self.node(id)?.vertical_alignment)
    }

    pub fn set_vertical_alignment(&mut self, id: ControlId, alignment: VerticalAlignment) -> Result<()> {
        self.set_layout_property(id, alignment, |n| &mut n.vertical_alignment)
            .map(drop)
    }

    pub fn dock(&self, id: ControlId) -> Result<Dock> {
        Ok(self.node(id)?.dock)
    }

    pub fn set_dock(&mut self, id: ControlId, dock: Dock) -> Result<()> {
        self.set_layout_property(id, dock, |n| &mut n.dock).map(drop)
    }

    pub fn layout(&self, id: ControlId) -> Result<LayoutStyle> {
        Ok(self.node(id)?.layout)
    }

    pub fn set_layout(&mut self, id: ControlId, layout: LayoutStyle) -> Result<()> {
        self.set_layout_property(id, layout, |n| &mut n.layout).map(drop)
    }

    pub fn suggested_size(&self, id: ControlId) -> Result<SuggestedSize> {
        Ok(self.node(id)?.suggested_size)
    }

    pub fn set_suggested_size(&mut self, id: ControlId, size: SuggestedSize) -> Result<()> {
        self.set_layout_property(id, size, |n| &mut n.suggested_size)
            .map(drop)
    }

    pub fn minimum_size(&self, id: ControlId) -> Result<Option<Size>> {
        Ok(self.node(id)?.minimum_size)
    }

    pub fn set_minimum_size(&mut self, id: ControlId, size: Option<Size>) -> Result<()> {
        self.set_layout_property(id, size, |n| &mut n.minimum_size)
            .map(drop)
    }

    pub fn maximum_size(&self, id: ControlId) -> Result<Option<Size>> {
        Ok(self.node(id)?.maximum_size)
    }

    pub fn set_maximum_size(&mut self, id: ControlId, size: Option<Size>) -> Result<()> {
        self.set_layout_property(id, size, |n| &mut n.maximum_size)
            .map(drop)
    }

    pub fn ignore_layout(&self, id: ControlId) -> Result<bool> {
        Ok(self.node(id)?.ignore_layout)
    }

    pub fn set_ignore_layout(&mut self, id: ControlId, ignore: bool) -> Result<()> {
        self.set_layout_property(id, ignore, |n| &mut n.ignore_layout)
            .map(drop)
    }

    pub fn is_visible(&self, id: ControlId) -> Result<bool> {
        Ok(self.node(id)?.visible)
    }

    pub fn set_visible(&mut self, id: ControlId, visible: bool) -> Result<()> {
        if self.set_layout_property(id, visible, |n| &mut n.visible)? {
            if let Some(handler) = self.node_mut(id)?.handler.handler.as_mut() {
                handler.set_visible(visible)?;
            }
        }
        Ok(())
    }

    /// Make the control visible and attach its handler
    pub fn show(&mut self, id: ControlId) -> Result<()> {
        self.set_visible(id, true)?;
        self.ensure_handler(id)
    }

    pub fn hide(&mut self, id: ControlId) -> Result<()> {
        self.set_visible(id, false)
    }

    pub fn is_enabled(&self, id: ControlId) -> Result<bool> {
        Ok(self.node(id)?.enabled)
    }

    pub fn set_enabled(&mut self, id: ControlId, enabled: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.enabled == enabled {
            return Ok(());
        }
        node.enabled = enabled;
        if let Some(handler) = node.handler.handler.as_mut() {
            handler.set_enabled(enabled)?;
        }
        Ok(())
    }

    // ========================================================================
    // Repaint and hit-testing
    // ========================================================================

    /// Mark for repaint the nearest control, starting at `id`, that has a
    /// native peer
    pub fn invalidate(&mut self, id: ControlId) -> Result<()> {
        if let Some(owner) = self.nearest_with_handler(id)? {
            if let Some(handler) = self.node_mut(owner)?.handler.handler.as_mut() {
                handler.invalidate()?;
            }
        }
        Ok(())
    }

    /// Invalidate and repaint immediately
    pub fn refresh(&mut self, id: ControlId) -> Result<()> {
        if let Some(owner) = self.nearest_with_handler(id)? {
            if let Some(handler) = self.node_mut(owner)?.handler.handler.as_mut() {
                handler.invalidate()?;
                handler.update()?;
            }
        }
        Ok(())
    }

    fn nearest_with_handler(&self, id: ControlId) -> Result<Option<ControlId>> {
        let mut current = Some(id);
        while let Some(control) = current {
            let node = self.node(control)?;
            if node.handler.handler.is_some() {
                return Ok(Some(control));
            }
            current = node.parent;
        }
        Ok(None)
    }

    /// Top-most visible child of `parent` containing `point` (in `parent`'s
    /// client coordinates)
    pub fn control_at(&self, parent: ControlId, point: Point) -> Result<Option<ControlId>> {
        let node = self.node(parent)?;
        Ok(node.children.iter().rev().copied().find(|child| {
            self.nodes
                .get(*child)
                .is_some_and(|n| n.visible && n.bounds.contains(point))
        }))
    }

    // ========================================================================
    // Layout scheduling
    // ========================================================================

    /// Mark `id` dirty and request a deferred layout pass
    pub fn perform_layout(&mut self, id: ControlId) -> Result<()> {
        self.node(id)?;
        self.invalidate_layout_chain(id);
        Ok(())
    }

    /// Mark `id` and its ancestors dirty, stopping at a suspended control
    pub(crate) fn invalidate_layout_chain(&mut self, id: ControlId) {
        let mut current = Some(id);
        while let Some(control) = current {
            let Some(node) = self.nodes.get(control) else {
                return;
            };
            if node.layout_suspend > 0 {
                return;
            }
            current = node.parent;
            self.scheduler.invalidate(control);
        }
    }

    pub fn suspend_layout(&mut self, id: ControlId) -> Result<()> {
        self.node_mut(id)?.layout_suspend += 1;
        Ok(())
    }

    /// Undo one `suspend_layout`; once fully resumed, `perform` requests a
    /// layout of the control
    pub fn resume_layout(&mut self, id: ControlId, perform: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.layout_suspend == 0 {
            return Err(ControlError::LayoutNotSuspended);
        }
        node.layout_suspend -= 1;
        if node.layout_suspend == 0 && perform {
            self.invalidate_layout_chain(id);
        }
        Ok(())
    }

    pub fn is_layout_suspended(&self, id: ControlId) -> Result<bool> {
        Ok(self.node(id)?.layout_suspend > 0)
    }

    /// Something is dirty and waiting for a pass
    pub fn needs_layout(&self) -> bool {
        self.scheduler.has_dirty()
    }

    /// Run one layout pass over everything invalidated since the last one.
    ///
    /// Returns the number of subtrees arranged. Does nothing if a pass is
    /// already running.
    pub fn run_layout_pass(&mut self) -> usize {
        let Some(dirty) = self.scheduler.begin_pass() else {
            return 0;
        };
        self.passes.set(self.passes.get() + 1);

        let dirty_set: FxHashSet<ControlId> = dirty.iter().copied().collect();
        let roots: Vec<ControlId> = dirty
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(*id))
            .filter(|id| !dirty_set.iter().any(|other| self.is_ancestor(*other, *id)))
            .collect();
        for root in &roots {
            self.attach_visible(*root);
            self.arrange_subtree(*root);
        }

        self.scheduler.end_pass();
        tracing::debug!(roots = roots.len(), "layout pass finished");
        roots.len()
    }

    /// Preferred size of `id` given `available` space.
    ///
    /// Measurement only: no handler is created and no event is raised, so
    /// leaves contribute their native size once a layout pass has attached
    /// their peers.
    pub fn preferred_size(&self, id: ControlId, available: Size) -> Result<Size> {
        self.node(id)?;
        Ok(self.measure(id, available))
    }

    pub fn stats(&self) -> LayoutStats {
        LayoutStats {
            passes: self.passes.get(),
            measure_calls: self.measure_calls.get(),
        }
    }
}

impl Drop for ControlTree {
    fn drop(&mut self) {
        let roots: Vec<ControlId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        for root in roots {
            let _ = self.dispose(root);
        }
    }
}

impl std::fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlTree")
            .field("controls", &self.nodes.len())
            .field("factory", &self.default_factory.name())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

fn same_factory(a: &Arc<dyn HandlerFactory>, b: &Arc<dyn HandlerFactory>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use trellis_platform::{HeadlessBackend, PlatformError};

    fn tree() -> (ControlTree, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        (ControlTree::new(Arc::new(backend.clone())), backend)
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let (mut tree, _) = tree();
        let root = tree.create_control(ControlKind::Window);
        let a = tree.create_control(ControlKind::Button);
        let b = tree.create_control(ControlKind::Button);
        let c = tree.create_control(ControlKind::Button);

        tree.add_child(root, a).unwrap();
        tree.add_child(root, c).unwrap();
        tree.insert_child(root, 1, b).unwrap();

        assert_eq!(tree.children(root).unwrap(), &[a, b, c]);
        assert_eq!(tree.parent(b).unwrap(), Some(root));
    }

    #[test]
    fn test_adding_ancestor_is_rejected() {
        let (mut tree, _) = tree();
        let root = tree.create_control(ControlKind::Window);
        let child = tree.create_control(ControlKind::Panel);
        tree.add_child(root, child).unwrap();

        assert_eq!(tree.add_child(child, root), Err(ControlError::WouldCreateCycle));
        assert_eq!(tree.add_child(child, child), Err(ControlError::WouldCreateCycle));
    }

    #[test]
    fn test_reparent_moves_child() {
        let (mut tree, _) = tree();
        let first = tree.create_control(ControlKind::Panel);
        let second = tree.create_control(ControlKind::Panel);
        let child = tree.create_control(ControlKind::Label);

        tree.add_child(first, child).unwrap();
        tree.add_child(second, child).unwrap();

        assert!(tree.children(first).unwrap().is_empty());
        assert_eq!(tree.children(second).unwrap(), &[child]);
        assert_eq!(tree.remove_child(first, child), Err(ControlError::NotAChild));

        tree.remove_child(second, child).unwrap();
        assert_eq!(tree.parent(child).unwrap(), None);
    }

    #[test]
    fn test_dispose_is_bottom_up_and_idempotent() {
        let (mut tree, backend) = tree();
        let root = tree.create_control(ControlKind::Window);
        let panel = tree.create_control(ControlKind::Panel);
        let leaf = tree.create_control(ControlKind::Label);
        tree.add_child(root, panel).unwrap();
        tree.add_child(panel, leaf).unwrap();
        tree.handler(root).unwrap();
        tree.handler(panel).unwrap();
        tree.handler(leaf).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        for id in [root, panel, leaf] {
            let order = order.clone();
            tree.events(id)
                .unwrap()
                .disposed
                .subscribe(move |id| order.borrow_mut().push(*id));
        }

        tree.dispose(root).unwrap();
        assert_eq!(*order.borrow(), vec![leaf, panel, root]);
        assert!(tree.is_empty());
        assert!(backend.peers().iter().all(|peer| peer.release_count() == 1));

        tree.dispose(root).unwrap();
        assert_eq!(tree.set_margin(leaf, Thickness::uniform(1.0)), Err(ControlError::Disposed(leaf)));
        assert!(matches!(tree.handler(panel), Err(ControlError::Disposed(_))));
    }

    #[test]
    fn test_dispose_releases_all_handlers_when_unwire_fails() {
        let backend = HeadlessBackend::new().fail_unwire(true);
        let mut tree = ControlTree::new(Arc::new(backend.clone()));
        let root = tree.create_control(ControlKind::Window);
        let child = tree.create_control(ControlKind::Button);
        tree.add_child(root, child).unwrap();
        tree.handler(root).unwrap();
        tree.handler(child).unwrap();

        let result = tree.dispose(root);
        assert!(matches!(result, Err(ControlError::Platform(_))));
        assert!(backend.peers().iter().all(|peer| peer.release_count() == 1));
        assert!(!tree.contains(child));
    }

    #[test]
    fn test_handler_created_once_per_cycle() {
        let (mut tree, backend) = tree();
        let button = tree.create_control(ControlKind::Button);
        let created = Rc::new(Cell::new(0));
        let counter = created.clone();
        tree.events(button)
            .unwrap()
            .handler_created
            .subscribe(move |_| counter.set(counter.get() + 1));

        tree.handler(button).unwrap();
        tree.handler(button).unwrap();
        assert_eq!(created.get(), 1);
        assert_eq!(tree.handler_state(button).unwrap(), HandlerState::Attached);

        tree.recreate_handler(button).unwrap();
        assert_eq!(created.get(), 2);
        assert_eq!(tree.handler_generation(button).unwrap(), 2);
        assert_eq!(backend.peers()[0].release_count(), 1);
        assert_eq!(backend.live_peers().len(), 1);
    }

    #[test]
    fn test_factory_override_is_inherited_and_reparent_recreates() {
        let (mut tree, default_backend) = tree();
        let other = HeadlessBackend::new();
        let other_factory: Arc<dyn HandlerFactory> = Arc::new(other.clone());

        let plain = tree.create_control(ControlKind::Panel);
        let custom = tree.create_control(ControlKind::Panel);
        tree.set_handler_factory(custom, Some(other_factory.clone())).unwrap();
        let leaf = tree.create_control(ControlKind::Button);
        tree.add_child(plain, leaf).unwrap();

        tree.handler(leaf).unwrap();
        assert_eq!(default_backend.peers().len(), 1);
        assert!(same_factory(&tree.effective_factory(leaf).unwrap(), tree.default_factory()));

        tree.add_child(custom, leaf).unwrap();
        assert!(!tree.has_handler(leaf).unwrap());
        assert!(default_backend.peers()[0].is_released());

        tree.handler(leaf).unwrap();
        assert_eq!(other.peers().len(), 1);
        assert!(same_factory(&tree.effective_factory(leaf).unwrap(), &other_factory));
    }

    #[test]
    fn test_stale_native_messages_are_dropped() {
        let (mut tree, backend) = tree();
        let button = tree.create_control(ControlKind::Button);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.events(button)
            .unwrap()
            .native
            .subscribe(move |event| sink.borrow_mut().push(event.clone()));

        tree.handler(button).unwrap();
        let old_relay = backend.peers()[0].relay().unwrap();
        assert!(backend.peers()[0].emit(NativeEvent::Activated));
        assert_eq!(tree.process_native_messages(), 1);

        tree.recreate_handler(button).unwrap();
        // In-flight callback from the released peer
        assert!(!old_relay.emit(NativeEvent::Focus(true)));
        let stale = PeerMessage {
            target: button.to_raw(),
            generation: 1,
            event: NativeEvent::Focus(true),
        };
        assert!(!tree.deliver_native(stale));

        assert!(backend.peers()[1].emit(NativeEvent::Focus(false)));
        assert_eq!(tree.process_native_messages(), 1);
        assert_eq!(
            *seen.borrow(),
            vec![NativeEvent::Activated, NativeEvent::Focus(false)]
        );

        tree.dispose(button).unwrap();
        let orphan = PeerMessage {
            target: button.to_raw(),
            generation: 2,
            event: NativeEvent::Activated,
        };
        assert!(!tree.deliver_native(orphan));
    }

    #[test]
    fn test_invalidate_forwards_to_nearest_peer() {
        let (mut tree, backend) = tree();
        let root = tree.create_control(ControlKind::Window);
        let child = tree.create_control(ControlKind::Container);
        tree.add_child(root, child).unwrap();
        tree.handler(root).unwrap();

        tree.invalidate(child).unwrap();
        tree.refresh(child).unwrap();

        let peer = &backend.peers()[0];
        assert_eq!(peer.invalidate_count(), 2);
        assert_eq!(peer.update_count(), 1);
    }

    #[test]
    fn test_suspend_and_resume_layout() {
        let (mut tree, _) = tree();
        let root = tree.create_control(ControlKind::Window);
        assert_eq!(tree.resume_layout(root, true), Err(ControlError::LayoutNotSuspended));

        tree.suspend_layout(root).unwrap();
        tree.set_padding(root, Thickness::uniform(2.0)).unwrap();
        assert!(!tree.needs_layout());

        tree.resume_layout(root, true).unwrap();
        assert!(tree.needs_layout());
        assert!(!tree.is_layout_suspended(root).unwrap());
    }

    #[test]
    fn test_control_at_prefers_topmost() {
        let (mut tree, _) = tree();
        let root = tree.create_control(ControlKind::Window);
        let below = tree.create_control(ControlKind::Panel);
        let above = tree.create_control(ControlKind::Panel);
        tree.add_child(root, below).unwrap();
        tree.add_child(root, above).unwrap();
        tree.set_bounds(below, Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        tree.set_bounds(above, Rect::new(25.0, 25.0, 50.0, 50.0)).unwrap();

        assert_eq!(tree.control_at(root, Point::new(30.0, 30.0)).unwrap(), Some(above));
        assert_eq!(tree.control_at(root, Point::new(10.0, 10.0)).unwrap(), Some(below));

        tree.hide(above).unwrap();
        assert_eq!(tree.control_at(root, Point::new(30.0, 30.0)).unwrap(), Some(below));
        assert_eq!(tree.control_at(root, Point::new(90.0, 90.0)).unwrap(), None);
    }

    #[test]
    fn test_set_bounds_pushes_to_peer_and_raises_event() {
        let (mut tree, backend) = tree();
        let button = tree.create_control(ControlKind::Button);
        tree.handler(button).unwrap();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        tree.events(button)
            .unwrap()
            .bounds_changed
            .subscribe(move |change| sink.borrow_mut().push(*change));

        let rect = Rect::new(1.0, 2.0, 30.0, 40.0);
        tree.set_bounds(button, rect).unwrap();
        tree.set_bounds(button, rect).unwrap();

        assert_eq!(backend.peers()[0].bounds(), rect);
        assert_eq!(
            *changes.borrow(),
            vec![BoundsChanged {
                old: Rect::ZERO,
                new: rect
            }]
        );
    }

    #[test]
    fn test_preferred_size_creates_no_handlers() {
        let backend =
            HeadlessBackend::new().with_preferred_size(ControlKind::Label, Size::new(40.0, 12.0));
        let mut tree = ControlTree::new(Arc::new(backend.clone()));
        let panel = tree.create_control(ControlKind::Panel);
        let label = tree.create_control(ControlKind::Label);
        tree.add_child(panel, label).unwrap();
        let created = Rc::new(Cell::new(0));
        for id in [panel, label] {
            let counter = created.clone();
            tree.events(id)
                .unwrap()
                .handler_created
                .subscribe(move |_| counter.set(counter.get() + 1));
        }

        assert_eq!(tree.preferred_size(panel, Size::INFINITE).unwrap(), Size::ZERO);
        assert_eq!(created.get(), 0);
        assert!(!tree.has_handler(label).unwrap());
        assert!(backend.peers().is_empty());

        tree.run_layout_pass();
        assert_eq!(created.get(), 2);
        assert_eq!(
            tree.preferred_size(panel, Size::INFINITE).unwrap(),
            Size::new(40.0, 12.0)
        );
    }

    #[test]
    fn test_layout_continues_when_peer_creation_fails() {
        let backend = HeadlessBackend::new().fail_create(true);
        let mut tree = ControlTree::new(Arc::new(backend.clone()));
        let root = tree.create_control(ControlKind::Window);
        tree.set_bounds(root, Rect::new(0.0, 0.0, 30.0, 20.0)).unwrap();
        let child = tree.create_control(ControlKind::Panel);
        tree.add_child(root, child).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(child).unwrap(), Rect::new(0.0, 0.0, 30.0, 20.0));
        assert!(!tree.has_handler(child).unwrap());
        assert!(matches!(
            tree.handler(child),
            Err(ControlError::Platform(PlatformError::CreateFailed(_)))
        ));
        assert!(backend.peers().is_empty());
    }
}
