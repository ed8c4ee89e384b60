//! Observable values for data binding
//!
//! [`ValueSource`] is a shared, thread-safe cell with change notification.
//! Setting a value equal to the current one is a no-op and raises nothing, so
//! two-way bindings cannot ping-pong.
//!
//! [`DisposableSource`] holds an optional [`Disposable`] resource and clears
//! itself (raising a change) when that resource is disposed elsewhere.
//!
//! # Example
//!
//! ```ignore
//! use trellis_core::value::ValueSource;
//!
//! let title = ValueSource::new(String::from("untitled"));
//! let sub = title.subscribe(|v| println!("title is now {v}"));
//!
//! assert!(title.set("report.txt".to_string()));
//! assert!(!title.set("report.txt".to_string())); // equal, no event
//! title.unsubscribe(sub);
//! ```

use crate::event::SubscriptionId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type ChangeCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SourceInner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(SubscriptionId, ChangeCallback<T>)>>,
}

// ============================================================================
// ValueSource
// ============================================================================

/// Shared observable value
///
/// Cloning yields another handle to the same value. Callbacks always run
/// outside the internal locks, so a callback may read or set the source.
pub struct ValueSource<T> {
    inner: Arc<SourceInner<T>>,
}

impl<T> Clone for ValueSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for ValueSource<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSource")
            .field("value", &*self.inner.value.lock())
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}

impl<T> ValueSource<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a change callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a change callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.lock();
        let before = subs.len();
        subs.retain(|(existing, _)| *existing != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Read the current value through a closure without cloning
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.lock())
    }

    /// Non-owning handle; does not keep the value alive
    pub fn downgrade(&self) -> WeakValueSource<T> {
        WeakValueSource {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same value
    pub fn ptr_eq(&self, other: &ValueSource<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit(&self, value: &T) {
        let subscribers: Vec<ChangeCallback<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in subscribers {
            callback(value);
        }
    }
}

impl<T: Clone> ValueSource<T> {
    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Raise a change event with the current value even though it did not change
    pub fn notify(&self) {
        let current = self.get();
        self.emit(&current);
    }
}

impl<T: Clone + PartialEq> ValueSource<T> {
    /// Store `value`, raising exactly one change event if it differs from the
    /// current value. Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.lock();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.emit(&value);
        true
    }

    /// Modify the value in place; raises a change only if the result differs
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let changed = {
            let mut current = self.inner.value.lock();
            let before = current.clone();
            f(&mut current);
            (*current != before).then(|| current.clone())
        };
        match changed {
            Some(value) => {
                self.emit(&value);
                true
            }
            None => false,
        }
    }
}

/// Weak counterpart of [`ValueSource`]
pub struct WeakValueSource<T> {
    inner: Weak<SourceInner<T>>,
}

impl<T> Clone for WeakValueSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakValueSource<T> {
    pub fn upgrade(&self) -> Option<ValueSource<T>> {
        self.inner.upgrade().map(|inner| ValueSource { inner })
    }
}

// ============================================================================
// Disposal notification
// ============================================================================

type DisposeCallback = Box<dyn FnOnce() + Send>;

struct NotifierInner {
    disposed: AtomicBool,
    subscribers: Mutex<Vec<(SubscriptionId, DisposeCallback)>>,
}

/// One-shot "this resource has been disposed" signal
///
/// Each subscriber runs at most once, on the thread that calls
/// [`DisposeNotifier::notify_disposed`].
#[derive(Clone)]
pub struct DisposeNotifier {
    inner: Arc<NotifierInner>,
}

impl Default for DisposeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeNotifier")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl DisposeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                disposed: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Run `callback` when the resource is disposed.
    ///
    /// Returns `None` (dropping the callback) if disposal already happened.
    pub fn subscribe<F>(&self, callback: F) -> Option<SubscriptionId>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut subs = self.inner.subscribers.lock();
        if self.is_disposed() {
            return None;
        }
        let id = SubscriptionId::next();
        subs.push((id, Box::new(callback)));
        Some(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.lock();
        let before = subs.len();
        subs.retain(|(existing, _)| *existing != id);
        subs.len() != before
    }

    /// Mark disposed and run every pending callback. Later calls do nothing.
    pub fn notify_disposed(&self) {
        let pending = {
            let mut subs = self.inner.subscribers.lock();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *subs)
        };
        for (_, callback) in pending {
            callback();
        }
    }

    pub fn ptr_eq(&self, other: &DisposeNotifier) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A resource that announces its own disposal
pub trait Disposable {
    fn dispose_notifier(&self) -> &DisposeNotifier;

    fn is_disposed(&self) -> bool {
        self.dispose_notifier().is_disposed()
    }
}

// ============================================================================
// DisposableSource
// ============================================================================

#[derive(Default)]
struct Watch {
    generation: u64,
    notifier: Option<(DisposeNotifier, SubscriptionId)>,
}

/// Observable slot for a disposable resource
///
/// Holding a disposed value is impossible: when the held resource is disposed
/// the slot becomes `None` and subscribers see one change event. Replacing
/// the value stops watching the previous one.
pub struct DisposableSource<T> {
    source: ValueSource<Option<T>>,
    watch: Arc<Mutex<Watch>>,
}

impl<T> DisposableSource<T>
where
    T: Disposable + Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            source: ValueSource::new(None),
            watch: Arc::new(Mutex::new(Watch::default())),
        }
    }

    pub fn with_value(value: T) -> Self {
        let slot = Self::new();
        slot.set(Some(value));
        slot
    }

    pub fn get(&self) -> Option<T> {
        self.source.get()
    }

    /// The underlying value source, for subscribing to changes
    pub fn source(&self) -> &ValueSource<Option<T>> {
        &self.source
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Option<T>) + Send + Sync + 'static,
    {
        self.source.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.source.unsubscribe(id)
    }

    /// Replace the held value. An already-disposed value is stored as `None`.
    pub fn set(&self, value: Option<T>) -> bool {
        let value = value.filter(|v| !v.is_disposed());
        if self.source.with(|current| *current == value) {
            return false;
        }

        let watched = {
            let mut watch = self.watch.lock();
            watch.generation = watch.generation.wrapping_add(1);
            if let Some((notifier, id)) = watch.notifier.take() {
                notifier.unsubscribe(id);
            }
            match &value {
                Some(resource) => {
                    let notifier = resource.dispose_notifier().clone();
                    let generation = watch.generation;
                    let weak_source = self.source.downgrade();
                    let weak_watch = Arc::downgrade(&self.watch);
                    let subscribed = notifier.subscribe(move || {
                        clear_on_dispose(&weak_source, &weak_watch, generation)
                    });
                    match subscribed {
                        Some(id) => {
                            watch.notifier = Some((notifier, id));
                            true
                        }
                        None => false,
                    }
                }
                None => true,
            }
        };

        if watched {
            self.source.set(value)
        } else {
            // Disposed between the filter above and subscribing
            self.source.set(None)
        }
    }

    pub fn clear(&self) -> bool {
        self.set(None)
    }
}

impl<T> Default for DisposableSource<T>
where
    T: Disposable + Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for DisposableSource<T> {
    fn drop(&mut self) {
        if let Some((notifier, id)) = self.watch.lock().notifier.take() {
            notifier.unsubscribe(id);
        }
    }
}

fn clear_on_dispose<T: Clone + PartialEq>(
    source: &WeakValueSource<Option<T>>,
    watch: &Weak<Mutex<Watch>>,
    generation: u64,
) {
    let (Some(source), Some(watch)) = (source.upgrade(), watch.upgrade()) else {
        return;
    };
    {
        let mut watch = watch.lock();
        if watch.generation != generation {
            return;
        }
        watch.notifier = None;
    }
    tracing::debug!("held value disposed, clearing disposable source");
    source.set(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct Resource {
        id: u32,
        notifier: DisposeNotifier,
    }

    impl Resource {
        fn new(id: u32) -> Self {
            Self {
                id,
                notifier: DisposeNotifier::new(),
            }
        }

        fn dispose(&self) {
            self.notifier.notify_disposed();
        }
    }

    impl PartialEq for Resource {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Disposable for Resource {
        fn dispose_notifier(&self) -> &DisposeNotifier {
            &self.notifier
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let reader = count.clone();
        (count, move || reader.load(Ordering::SeqCst))
    }

    #[test]
    fn test_set_equal_value_is_noop() {
        let source = ValueSource::new(5);
        let (count, changes) = counter();
        source.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!source.set(5));
        assert_eq!(changes(), 0);

        assert!(source.set(6));
        assert_eq!(changes(), 1);
        assert_eq!(source.get(), 6);
    }

    #[test]
    fn test_update_only_raises_on_change() {
        let source = ValueSource::new(vec![1, 2]);
        let (count, changes) = counter();
        source.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!source.update(|v| v.sort()));
        assert!(source.update(|v| v.push(3)));
        assert_eq!(changes(), 1);
        assert_eq!(source.get(), vec![1, 2, 3]);
    }

    #[test]
    fn test_callback_can_read_source() {
        let source = ValueSource::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = source.clone();
        let sink = seen.clone();
        source.subscribe(move |v| sink.lock().push((*v, reader.get())));

        source.set(2);
        assert_eq!(*seen.lock(), vec![(2, 2)]);
    }

    #[test]
    fn test_notify_reraises_current_value() {
        let source = ValueSource::new("a");
        let (count, changes) = counter();
        source.subscribe(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        source.notify();
        assert_eq!(changes(), 1);
    }

    #[test]
    fn test_weak_source_does_not_keep_alive() {
        let source = ValueSource::new(0);
        let weak = source.downgrade();
        assert!(weak.upgrade().is_some());
        drop(source);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_dispose_notifier_runs_once() {
        let notifier = DisposeNotifier::new();
        let (count, fired) = counter();
        notifier.subscribe(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify_disposed();
        notifier.notify_disposed();
        assert_eq!(fired(), 1);
        assert!(notifier.subscribe(|| {}).is_none());
    }

    #[test]
    fn test_disposable_source_clears_on_dispose() {
        let slot = DisposableSource::new();
        let resource = Resource::new(1);
        slot.set(Some(resource.clone()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        slot.subscribe(move |v: &Option<Resource>| sink.lock().push(v.as_ref().map(|r| r.id)));

        resource.dispose();
        assert!(slot.get().is_none());
        assert_eq!(*seen.lock(), vec![None]);
    }

    #[test]
    fn test_disposable_source_stops_watching_replaced_value() {
        let slot = DisposableSource::new();
        let first = Resource::new(1);
        let second = Resource::new(2);
        slot.set(Some(first.clone()));
        slot.set(Some(second.clone()));

        first.dispose();
        assert_eq!(slot.get().map(|r| r.id), Some(2));

        second.dispose();
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_disposable_source_rejects_disposed_value() {
        let resource = Resource::new(3);
        resource.dispose();
        let slot = DisposableSource::new();
        assert!(!slot.set(Some(resource)));
        assert!(slot.get().is_none());
    }
}
