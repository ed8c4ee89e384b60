//! Headless backend
//!
//! Native controls that exist only in memory. Used for offscreen layout and
//! throughout the test suites: every peer the backend creates is recorded and
//! can be inspected (bounds, release count) or driven (emitting native events)
//! through a [`HeadlessPeer`] handle.
//!
//! ```ignore
//! let backend = HeadlessBackend::new()
//!     .with_preferred_size(ControlKind::Button, Size::new(80.0, 24.0));
//! let tree = ControlTree::new(Arc::new(backend.clone()));
//! // ... lay out, then inspect backend.peers()
//! ```

use crate::error::{PlatformError, Result};
use crate::event::{EventRelay, NativeEvent};
use crate::native::{ControlKind, HandlerFactory, NativeControl};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use trellis_core::{Rect, Size};

#[derive(Debug, Default)]
struct PeerRecord {
    id: u64,
    kind: ControlKind,
    bounds: Rect,
    visible: bool,
    enabled: bool,
    relay: Option<EventRelay>,
    connects: u32,
    releases: u32,
    invalidations: u32,
    updates: u32,
}

#[derive(Default)]
struct BackendState {
    next_id: u64,
    peers: Vec<Arc<Mutex<PeerRecord>>>,
    preferred: FxHashMap<ControlKind, Size>,
    unsupported: FxHashSet<ControlKind>,
    fail_create: bool,
    fail_unwire: bool,
}

/// In-memory [`HandlerFactory`]
///
/// Clones share the same record of created peers.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<BackendState>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Natural size reported by peers of `kind` (zero otherwise)
    pub fn with_preferred_size(self, kind: ControlKind, size: Size) -> Self {
        self.state.lock().preferred.insert(kind, size);
        self
    }

    /// Refuse to create peers of `kind`
    pub fn without_kind(self, kind: ControlKind) -> Self {
        self.state.lock().unsupported.insert(kind);
        self
    }

    /// Make peer creation fail for every kind, as a toolkit out of
    /// resources would
    pub fn fail_create(self, fail: bool) -> Self {
        self.state.lock().fail_create = fail;
        self
    }

    /// Make every peer's `disconnect` fail
    pub fn fail_unwire(self, fail: bool) -> Self {
        self.state.lock().fail_unwire = fail;
        self
    }

    /// Every peer created so far, in creation order
    pub fn peers(&self) -> Vec<HeadlessPeer> {
        self.state
            .lock()
            .peers
            .iter()
            .map(|record| HeadlessPeer {
                record: Arc::clone(record),
            })
            .collect()
    }

    /// Most recently created peer of `kind`
    pub fn last_peer(&self, kind: &ControlKind) -> Option<HeadlessPeer> {
        self.peers().into_iter().rev().find(|peer| peer.kind() == *kind)
    }

    /// Peers not yet released
    pub fn live_peers(&self) -> Vec<HeadlessPeer> {
        self.peers()
            .into_iter()
            .filter(|peer| !peer.is_released())
            .collect()
    }
}

impl HandlerFactory for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_native_control(&self, kind: &ControlKind) -> Result<Box<dyn NativeControl>> {
        let mut state = self.state.lock();
        if state.unsupported.contains(kind) {
            return Err(PlatformError::Unsupported(kind.to_string()));
        }
        if state.fail_create {
            return Err(PlatformError::CreateFailed(format!("headless peer for {kind}")));
        }

        state.next_id += 1;
        let record = Arc::new(Mutex::new(PeerRecord {
            id: state.next_id,
            kind: kind.clone(),
            visible: true,
            enabled: true,
            ..Default::default()
        }));
        state.peers.push(Arc::clone(&record));

        Ok(Box::new(HeadlessControl {
            record,
            preferred: state.preferred.get(kind).copied().unwrap_or(Size::ZERO),
            fail_unwire: state.fail_unwire,
        }))
    }
}

/// Native control backed by a [`PeerRecord`]
struct HeadlessControl {
    record: Arc<Mutex<PeerRecord>>,
    preferred: Size,
    fail_unwire: bool,
}

impl NativeControl for HeadlessControl {
    fn bounds(&self) -> Rect {
        self.record.lock().bounds
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.record.lock().bounds = bounds;
    }

    fn connect(&mut self, relay: EventRelay) {
        let mut record = self.record.lock();
        record.relay = Some(relay);
        record.connects += 1;
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut record = self.record.lock();
        record.relay = None;
        if self.fail_unwire {
            return Err(PlatformError::Unwire(format!("peer {} refused", record.id)));
        }
        Ok(())
    }

    fn preferred_size(&self, _available: Size) -> Size {
        self.preferred
    }

    fn set_visible(&mut self, visible: bool) {
        self.record.lock().visible = visible;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.record.lock().enabled = enabled;
    }

    fn invalidate(&mut self) {
        self.record.lock().invalidations += 1;
    }

    fn update(&mut self) {
        self.record.lock().updates += 1;
    }

    fn release(&mut self) {
        let mut record = self.record.lock();
        record.relay = None;
        record.releases += 1;
    }
}

/// Inspection and driving handle for one headless peer
#[derive(Clone)]
pub struct HeadlessPeer {
    record: Arc<Mutex<PeerRecord>>,
}

impl HeadlessPeer {
    pub fn id(&self) -> u64 {
        self.record.lock().id
    }

    pub fn kind(&self) -> ControlKind {
        self.record.lock().kind.clone()
    }

    pub fn bounds(&self) -> Rect {
        self.record.lock().bounds
    }

    pub fn is_visible(&self) -> bool {
        self.record.lock().visible
    }

    pub fn is_enabled(&self) -> bool {
        self.record.lock().enabled
    }

    pub fn is_connected(&self) -> bool {
        self.record.lock().relay.is_some()
    }

    pub fn connect_count(&self) -> u32 {
        self.record.lock().connects
    }

    pub fn release_count(&self) -> u32 {
        self.record.lock().releases
    }

    pub fn is_released(&self) -> bool {
        self.release_count() > 0
    }

    pub fn invalidate_count(&self) -> u32 {
        self.record.lock().invalidations
    }

    pub fn update_count(&self) -> u32 {
        self.record.lock().updates
    }

    /// Raise a native event as the platform would.
    ///
    /// Returns false if the peer has no live relay.
    pub fn emit(&self, event: NativeEvent) -> bool {
        // Clone the relay out so the sink runs without the record lock held
        let relay = self.record.lock().relay.clone();
        match relay {
            Some(relay) => relay.emit(event),
            None => false,
        }
    }

    /// Current relay, if connected
    pub fn relay(&self) -> Option<EventRelay> {
        self.record.lock().relay.clone()
    }
}

impl std::fmt::Debug for HeadlessPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.lock();
        f.debug_struct("HeadlessPeer")
            .field("id", &record.id)
            .field("kind", &record.kind)
            .field("bounds", &record.bounds)
            .field("releases", &record.releases)
            .finish()
    }
}
