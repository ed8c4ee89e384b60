//! Background task queue
//!
//! An unbounded FIFO of work units drained by exactly one consumer thread.
//! Any thread may enqueue. A unit is a closure or a future returning
//! `anyhow::Result<()>`; futures are driven to completion on the consumer
//! thread with `futures::executor::block_on`.
//!
//! Failures (returned errors and panics alike) never stop the consumer. They
//! are handed to the queue's [`FailureReporter`], which by default logs them.
//!
//! ```ignore
//! let queue = TaskQueue::new();
//! queue.start("trellis-tasks")?;
//! queue.enqueue(|| {
//!     index_documents()?;
//!     Ok(())
//! })?;
//! queue.enqueue_future(async { fetch_thumbnails().await })?;
//! ```

use crate::error::{QueueError, QueueResult};
use crate::panic_message;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Receives every failed unit
pub type FailureReporter = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

/// How a unit failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The unit returned `Err`
    Error,
    /// The unit panicked
    Panic,
}

/// A failed unit of work
#[derive(Clone, Debug)]
pub struct TaskFailure {
    /// Position of the unit in enqueue order, starting at 1
    pub sequence: u64,
    pub kind: FailureKind,
    pub message: String,
}

/// Reporter that logs failures with `tracing::error!`
pub fn log_failures() -> FailureReporter {
    Arc::new(|failure: &TaskFailure| {
        tracing::error!(
            sequence = failure.sequence,
            kind = ?failure.kind,
            "background task failed: {}",
            failure.message
        );
    })
}

enum Unit {
    Call(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
    Future(BoxFuture<'static, anyhow::Result<()>>),
}

impl Unit {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Unit::Call(call) => call(),
            Unit::Future(future) => futures::executor::block_on(future),
        }
    }
}

struct State {
    items: VecDeque<(u64, Unit)>,
    enqueued: u64,
    cancelled: bool,
    started: bool,
}

struct Shared {
    state: Mutex<State>,
    /// Signalled when an item arrives or the queue is cancelled
    pending: Condvar,
    reporter: Mutex<FailureReporter>,
}

impl Shared {
    fn push(&self, unit: Unit) -> QueueResult<()> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(QueueError::Cancelled);
        }
        state.enqueued += 1;
        let sequence = state.enqueued;
        state.items.push_back((sequence, unit));
        drop(state);
        self.pending.notify_one();
        Ok(())
    }

    /// Wait for the next unit; `None` once cancelled
    fn next(&self) -> Option<(u64, Unit)> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            self.pending.wait(&mut state);
        }
    }

    fn consume(&self) {
        tracing::debug!("task queue consumer started");
        while let Some((sequence, unit)) = self.next() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.run()));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => TaskFailure {
                    sequence,
                    kind: FailureKind::Error,
                    message: format!("{err:#}"),
                },
                Err(payload) => TaskFailure {
                    sequence,
                    kind: FailureKind::Panic,
                    message: panic_message(&*payload),
                },
            };
            let reporter = self.reporter.lock().clone();
            reporter(&failure);
        }
        tracing::debug!(left = self.state.lock().items.len(), "task queue consumer stopped");
    }
}

/// Cloneable producer handle for a [`TaskQueue`]
#[derive(Clone)]
pub struct TaskSender {
    shared: Arc<Shared>,
}

impl TaskSender {
    /// Queue a closure. Fails once the queue is cancelled.
    pub fn enqueue<F>(&self, task: F) -> QueueResult<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.push(Unit::Call(Box::new(task)))
    }

    /// Queue a future, run to completion on the consumer thread
    pub fn enqueue_future<Fut>(&self, task: Fut) -> QueueResult<()>
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shared.push(Unit::Future(task.boxed()))
    }
}

impl fmt::Debug for TaskSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSender").finish_non_exhaustive()
    }
}

/// Single-consumer background work queue
pub struct TaskQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::with_reporter(log_failures())
    }

    pub fn with_reporter(reporter: FailureReporter) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    enqueued: 0,
                    cancelled: false,
                    started: false,
                }),
                pending: Condvar::new(),
                reporter: Mutex::new(reporter),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Replace the failure reporter; applies to failures from now on
    pub fn set_reporter(&self, reporter: FailureReporter) {
        *self.shared.reporter.lock() = reporter;
    }

    pub fn sender(&self) -> TaskSender {
        TaskSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn enqueue<F>(&self, task: F) -> QueueResult<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.push(Unit::Call(Box::new(task)))
    }

    pub fn enqueue_future<Fut>(&self, task: Fut) -> QueueResult<()>
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shared.push(Unit::Future(task.boxed()))
    }

    /// Units waiting to run
    pub fn pending(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Start the consumer on a thread called `thread_name`.
    ///
    /// A queue has one consumer for its whole life; a second call fails with
    /// [`QueueError::AlreadyRunning`].
    pub fn start(&self, thread_name: &str) -> QueueResult<()> {
        self.claim_consumer()?;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || shared.consume())
            .map_err(|err| QueueError::Spawn(err.to_string()))?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Consume on the current thread until the queue is cancelled
    pub fn run(&self) -> QueueResult<()> {
        self.claim_consumer()?;
        self.shared.consume();
        Ok(())
    }

    fn claim_consumer(&self) -> QueueResult<()> {
        let mut state = self.shared.state.lock();
        if state.started {
            return Err(QueueError::AlreadyRunning);
        }
        state.started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.lock().started
    }

    /// Stop the consumer at its next wait. A unit already running finishes;
    /// queued units are not run.
    pub fn cancel(&self) {
        self.shared.state.lock().cancelled = true;
        self.shared.pending.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.state.lock().cancelled
    }

    /// Wait for the consumer thread to exit (after [`TaskQueue::cancel`])
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.join() {
                tracing::error!(panic = %panic_message(&*err), "task queue thread panicked");
            }
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &state.items.len())
            .field("started", &state.started)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_units_run_in_fifo_order() {
        let queue = TaskQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();

        for item in ["A", "B", "C"] {
            let seen = seen.clone();
            queue
                .enqueue(move || {
                    seen.lock().push(item);
                    Ok(())
                })
                .unwrap();
        }
        queue
            .enqueue(move || {
                done_tx.send(()).ok();
                Ok(())
            })
            .unwrap();
        queue.start("test-tasks").unwrap();

        done_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(*seen.lock(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_failures_are_reported_and_isolated() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let queue = TaskQueue::with_reporter(Arc::new(move |failure: &TaskFailure| {
            sink.lock().push(failure.clone());
        }));
        let (done_tx, done_rx) = mpsc::channel();

        queue.enqueue(|| Err(anyhow::anyhow!("disk full"))).unwrap();
        queue.enqueue(|| panic!("worker bug")).unwrap();
        queue
            .enqueue_future(async { Err::<(), _>(anyhow::anyhow!("timed out")) })
            .unwrap();
        queue
            .enqueue_future(async move {
                done_tx.send(()).ok();
                Ok::<(), anyhow::Error>(())
            })
            .unwrap();
        queue.start("test-tasks").unwrap();
        done_rx.recv_timeout(WAIT).unwrap();

        let failures = failures.lock();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].kind, FailureKind::Error);
        assert_eq!(failures[0].message, "disk full");
        assert_eq!(failures[1].kind, FailureKind::Panic);
        assert_eq!(failures[1].message, "worker bug");
        assert_eq!(failures[2].sequence, 3);
    }

    #[test]
    fn test_second_consumer_is_refused() {
        let queue = TaskQueue::new();
        queue.start("test-tasks").unwrap();
        assert_eq!(queue.start("test-tasks-2"), Err(QueueError::AlreadyRunning));
        assert_eq!(queue.run(), Err(QueueError::AlreadyRunning));
    }

    #[test]
    fn test_cancel_stops_without_draining() {
        let queue = TaskQueue::new();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let ran_later = Arc::new(Mutex::new(false));

        queue
            .enqueue(move || {
                started_tx.send(()).ok();
                release_rx.recv_timeout(WAIT).ok();
                Ok(())
            })
            .unwrap();
        queue.start("test-tasks").unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        let flag = ran_later.clone();
        queue
            .enqueue(move || {
                *flag.lock() = true;
                Ok(())
            })
            .unwrap();
        queue.cancel();
        release_tx.send(()).unwrap();
        queue.join();

        assert!(!*ran_later.lock());
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.enqueue(|| Ok(())), Err(QueueError::Cancelled));
    }

    #[test]
    fn test_sender_feeds_the_queue_from_other_threads() {
        let queue = TaskQueue::new();
        let sender = queue.sender();
        let (done_tx, done_rx) = mpsc::channel();
        queue.start("test-tasks").unwrap();

        thread::spawn(move || {
            sender
                .enqueue(move || {
                    done_tx.send(thread::current().name().map(str::to_string)).ok();
                    Ok(())
                })
                .unwrap();
        });

        let name = done_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(name.as_deref(), Some("test-tasks"));
    }
}
