//! UI thread dispatcher
//!
//! A [`Dispatcher`] belongs to the thread that created it (the UI thread) and
//! queues jobs against UI-owned state `S`. The run loop hands that state in
//! when it drains the queue, so jobs get `&mut S` without `S` ever leaving
//! the UI thread.
//!
//! Other threads post work through a [`DispatcherHandle`]:
//!
//! - [`DispatcherHandle::invoke`] blocks until the job has run and returns
//!   its value, re-raising any panic in the caller
//! - [`DispatcherHandle::begin_invoke`] queues the job and returns at once
//!
//! ```ignore
//! let dispatcher = Dispatcher::<ControlTree>::new();
//! let handle = dispatcher.handle();
//!
//! std::thread::spawn(move || {
//!     let count = handle.invoke(|tree| tree.len()).unwrap();
//! });
//!
//! loop {
//!     dispatcher.wait_and_process(&mut tree, Duration::from_millis(16));
//! }
//! ```

use crate::error::{DispatchError, DispatchResult};
use crate::panic_message;
use futures::channel::oneshot;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Queue<S> {
    jobs: VecDeque<Job<S>>,
    shutdown: bool,
}

struct Shared<S> {
    queue: Mutex<Queue<S>>,
    ready: Condvar,
    ui_thread: ThreadId,
}

impl<S> Shared<S> {
    fn post(&self, job: Job<S>) -> DispatchResult<()> {
        let mut queue = self.queue.lock();
        if queue.shutdown {
            return Err(DispatchError::Shutdown);
        }
        queue.jobs.push_back(job);
        drop(queue);
        self.ready.notify_one();
        Ok(())
    }

    fn shutdown(&self) {
        let dropped = {
            let mut queue = self.queue.lock();
            queue.shutdown = true;
            std::mem::take(&mut queue.jobs)
        };
        self.ready.notify_all();
        if !dropped.is_empty() {
            tracing::debug!(dropped = dropped.len(), "dispatcher shut down with pending jobs");
        }
        // Dropping the jobs wakes any blocked invoker with `Shutdown`
        drop(dropped);
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// UI-thread side of the dispatch queue
pub struct Dispatcher<S> {
    shared: Arc<Shared<S>>,
    _not_send: PhantomData<*const ()>,
}

impl<S> Dispatcher<S> {
    /// Create a dispatcher bound to the current thread
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    jobs: VecDeque::new(),
                    shutdown: false,
                }),
                ready: Condvar::new(),
                ui_thread: thread::current().id(),
            }),
            _not_send: PhantomData,
        }
    }

    /// Producer handle for other threads
    pub fn handle(&self) -> DispatcherHandle<S> {
        DispatcherHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn ui_thread(&self) -> ThreadId {
        self.shared.ui_thread
    }

    /// Run `action` right away; on the UI thread nothing needs queuing
    pub fn invoke<R>(&self, state: &mut S, action: impl FnOnce(&mut S) -> R) -> R {
        action(state)
    }

    /// Queue `action` to run on a later drain, even from the UI thread
    pub fn begin_invoke<F>(&self, action: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.shared.post(Box::new(action))
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.queue.lock().jobs.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Run every job queued at the time of the call.
    ///
    /// Jobs queued while draining wait for the next call. A panicking job is
    /// logged and skipped. Returns the number of jobs run.
    pub fn process_pending(&self, state: &mut S) -> usize {
        let batch = std::mem::take(&mut self.shared.queue.lock().jobs);
        let count = batch.len();
        for job in batch {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(state))) {
                tracing::error!(panic = %panic_message(&*payload), "dispatched job panicked");
            }
        }
        count
    }

    /// Block until work is queued (or `timeout` passes), then drain it
    pub fn wait_and_process(&self, state: &mut S, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        {
            let mut queue = self.shared.queue.lock();
            while queue.jobs.is_empty() && !queue.shutdown {
                if self.shared.ready.wait_until(&mut queue, deadline).timed_out() {
                    break;
                }
            }
        }
        self.process_pending(state)
    }

    /// Stop accepting work and drop what is queued. Blocked and future
    /// `invoke` callers get [`DispatchError::Shutdown`].
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().shutdown
    }
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("ui_thread", &self.shared.ui_thread)
            .field("pending", &self.pending())
            .finish()
    }
}

impl<S> Drop for Dispatcher<S> {
    /// Nothing drains the queue once the UI side is gone: queued jobs are
    /// dropped and blocked invokers get `Shutdown`
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Thread-safe producer side of a [`Dispatcher`]
///
/// Meant for worker threads. Dropping the [`Dispatcher`] shuts the queue
/// down, after which every call fails with [`DispatchError::Shutdown`].
pub struct DispatcherHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> DispatcherHandle<S> {
    /// True when called from the dispatcher's UI thread
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.shared.ui_thread
    }

    /// Run `action` on the UI thread and wait for its result.
    ///
    /// A panic in `action` resumes in the calling thread. Fails with
    /// [`DispatchError::WouldBlockUiThread`] on the UI thread, which would
    /// otherwise wait on itself forever. Code already on the UI thread calls
    /// [`Dispatcher::invoke`] (or `App::invoke`) instead, which runs inline.
    pub fn invoke<F, R>(&self, action: F) -> DispatchResult<R>
    where
        S: 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Err(DispatchError::WouldBlockUiThread);
        }

        let (tx, rx) = oneshot::channel();
        self.shared.post(Box::new(move |state: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(state)));
            let _ = tx.send(outcome);
        }))?;

        match futures::executor::block_on(rx) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            // The job was dropped unrun
            Err(oneshot::Canceled) => Err(DispatchError::Shutdown),
        }
    }

    /// Queue `action` for the UI thread and return immediately
    pub fn begin_invoke<F>(&self, action: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.shared.post(Box::new(action))
    }

    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().shutdown
    }
}

impl<S> fmt::Debug for DispatcherHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("ui_thread", &self.shared.ui_thread)
            .finish()
    }
}
