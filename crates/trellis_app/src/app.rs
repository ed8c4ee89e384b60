//! Trellis Application
//!
//! [`App`] ties the pieces together on the UI thread: it owns the
//! [`ControlTree`], the [`Dispatcher`] that feeds it and the background
//! [`TaskQueue`]. Native events and layout requests reach the tree as
//! dispatcher jobs, so everything that touches controls runs in the run loop.

use crate::config::AppConfig;
use crate::error::Result;
use crate::logging;
use std::sync::Arc;
use std::time::Duration;
use trellis_core::{Point, Rect, Size};
use trellis_layout::{ControlId, ControlTree, LayoutStyle};
use trellis_platform::{ControlFlow, ControlKind, HandlerFactory, PeerMessage};
use trellis_runtime::{
    DispatchResult, Dispatcher, DispatcherHandle, FailureReporter, QueueResult, TaskQueue,
    TaskSender,
};

/// Upper bound on drain rounds in [`App::pump_until_idle`]
const MAX_IDLE_ROUNDS: usize = 64;

/// A Trellis application bound to the thread that created it
///
/// # Example
///
/// ```ignore
/// use trellis_app::prelude::*;
///
/// let mut app = App::new(AppConfig::default(), Arc::new(HeadlessBackend::new()))?;
/// let button = app.tree_mut().create_control(ControlKind::Button);
/// app.tree_mut().add_child(app.root(), button)?;
///
/// let handle = app.handle();
/// std::thread::spawn(move || {
///     handle.invoke(move |tree| tree.set_enabled(button, false)).ok();
/// });
///
/// app.run_until(|tree| {
///     if tree.is_enabled(button).unwrap_or(false) {
///         ControlFlow::Continue
///     } else {
///         ControlFlow::Exit
///     }
/// });
/// ```
pub struct App {
    tree: ControlTree,
    dispatcher: Dispatcher<ControlTree>,
    tasks: TaskQueue,
    config: AppConfig,
    root: ControlId,
}

impl App {
    /// Create the application on the current thread, which becomes its UI
    /// thread
    pub fn new(config: AppConfig, factory: Arc<dyn HandlerFactory>) -> Result<Self> {
        logging::init(&config.log_filter);

        let dispatcher = Dispatcher::new();
        let mut tree = ControlTree::new(factory);

        let relay = dispatcher.handle();
        tree.set_relay_sink(Arc::new(move |msg: PeerMessage| {
            if relay
                .begin_invoke(move |tree: &mut ControlTree| {
                    tree.deliver_native(msg);
                })
                .is_err()
            {
                tracing::debug!("native event after shutdown dropped");
            }
        }));

        let layout = dispatcher.handle();
        tree.set_layout_request_hook(Some(Arc::new(move || {
            if layout
                .begin_invoke(|tree: &mut ControlTree| {
                    tree.run_layout_pass();
                })
                .is_err()
            {
                tracing::debug!("layout request after shutdown dropped");
            }
        })));

        let root = tree.create_control(ControlKind::Window);
        tree.set_name(root, "root")?;
        tree.set_layout(root, LayoutStyle::Dock)?;
        tree.set_bounds(root, config.root_size().to_rect())?;

        let tasks = TaskQueue::new();
        if config.background_queue {
            tasks.start(&config.queue_thread_name)?;
        }

        tracing::info!(
            factory = tree.default_factory().name(),
            background_queue = config.background_queue,
            "application created"
        );

        Ok(Self {
            tree,
            dispatcher,
            tasks,
            config,
            root,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The top-level window control
    pub fn root(&self) -> ControlId {
        self.root
    }

    pub fn tree(&self) -> &ControlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ControlTree {
        &mut self.tree
    }

    pub fn dispatcher(&self) -> &Dispatcher<ControlTree> {
        &self.dispatcher
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Producer handle for other threads
    pub fn handle(&self) -> AppHandle {
        AppHandle {
            dispatcher: self.dispatcher.handle(),
            tasks: self.tasks.sender(),
        }
    }

    /// Route background task failures to `reporter`
    pub fn set_failure_reporter(&self, reporter: FailureReporter) {
        self.tasks.set_reporter(reporter);
    }

    /// Run `action` against the tree now
    pub fn invoke<R>(&mut self, action: impl FnOnce(&mut ControlTree) -> R) -> R {
        self.dispatcher.invoke(&mut self.tree, action)
    }

    /// Queue `action` for the next drain
    pub fn begin_invoke<F>(&self, action: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut ControlTree) + Send + 'static,
    {
        self.dispatcher.begin_invoke(action)
    }

    /// Resize the root control; its layout follows on the next drain
    pub fn resize(&mut self, size: Size) -> Result<()> {
        self.tree.set_bounds(self.root, Rect::from_origin_size(Point::ZERO, size))?;
        Ok(())
    }

    /// Run the jobs queued so far; returns how many ran
    pub fn pump(&mut self) -> usize {
        self.dispatcher.process_pending(&mut self.tree)
    }

    /// Wait up to `timeout` for work, then run what is queued
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        self.dispatcher.wait_and_process(&mut self.tree, timeout)
    }

    /// Drain until nothing is queued, including jobs queued by jobs
    pub fn pump_until_idle(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_IDLE_ROUNDS {
            if !self.dispatcher.has_pending() {
                break;
            }
            total += self.pump();
        }
        total
    }

    /// Run the UI loop until `step` returns [`ControlFlow::Exit`] or the
    /// dispatcher shuts down. `step` runs after every wait, with or
    /// without work.
    pub fn run_until<F>(&mut self, mut step: F)
    where
        F: FnMut(&mut ControlTree) -> ControlFlow,
    {
        let timeout = self.config.idle_timeout();
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "run loop started");
        loop {
            self.wait_and_pump(timeout);
            if step(&mut self.tree) == ControlFlow::Exit || self.dispatcher.is_shutdown() {
                break;
            }
        }
        tracing::debug!("run loop stopped");
    }

    /// Stop the dispatcher and the background queue. Blocked invokers are
    /// released with a shutdown error; queued background work is abandoned.
    pub fn shutdown(&mut self) {
        if self.dispatcher.is_shutdown() {
            return;
        }
        self.dispatcher.shutdown();
        self.tasks.cancel();
        self.tasks.join();
        tracing::info!("application shut down");
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("root", &self.root)
            .field("tree", &self.tree)
            .field("dispatcher", &self.dispatcher)
            .field("tasks", &self.tasks)
            .finish()
    }
}

/// Thread-safe handle to an [`App`]
#[derive(Clone, Debug)]
pub struct AppHandle {
    dispatcher: DispatcherHandle<ControlTree>,
    tasks: TaskSender,
}

impl AppHandle {
    /// Run `action` on the UI thread and wait for its result
    pub fn invoke<F, R>(&self, action: F) -> DispatchResult<R>
    where
        F: FnOnce(&mut ControlTree) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.dispatcher.invoke(action)
    }

    /// Queue `action` for the UI thread
    pub fn begin_invoke<F>(&self, action: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut ControlTree) + Send + 'static,
    {
        self.dispatcher.begin_invoke(action)
    }

    /// Queue background work
    pub fn spawn<F>(&self, task: F) -> QueueResult<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.tasks.enqueue(task)
    }

    /// Queue a background future
    pub fn spawn_future<Fut>(&self, task: Fut) -> QueueResult<()>
    where
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.enqueue_future(task)
    }

    pub fn dispatcher(&self) -> &DispatcherHandle<ControlTree> {
        &self.dispatcher
    }

    pub fn is_ui_thread(&self) -> bool {
        self.dispatcher.is_ui_thread()
    }
}
