//! Per-event subscriber lists
//!
//! [`EventHandlers`] is the single-threaded callback list used by control-level
//! events. Handlers are `FnMut` and run synchronously in subscription order.
//!
//! ```ignore
//! let mut resized: EventHandlers<Rect> = EventHandlers::new();
//! let id = resized.subscribe(|rect| println!("new bounds {:?}", rect));
//! resized.emit(&Rect::new(0.0, 0.0, 10.0, 10.0));
//! resized.unsubscribe(id);
//! ```

use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one subscription to an event or value source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate a process-unique subscription id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Handler<A> = Box<dyn FnMut(&A)>;

/// Ordered list of callbacks for one event
pub struct EventHandlers<A> {
    handlers: SmallVec<[(SubscriptionId, Handler<A>); 2]>,
}

impl<A> Default for EventHandlers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventHandlers<A> {
    pub fn new() -> Self {
        Self {
            handlers: SmallVec::new(),
        }
    }

    /// Register a callback; returns an id for [`EventHandlers::unsubscribe`]
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&A) + 'static,
    {
        let id = SubscriptionId::next();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a callback. Returns false if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    /// Invoke every callback with `args`
    pub fn emit(&mut self, args: &A) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(args);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drop every callback
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<A> std::fmt::Debug for EventHandlers<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
