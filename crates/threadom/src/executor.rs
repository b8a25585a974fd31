//! The task executor.
//!
//! [`Executor`] bridges a single-threaded main loop and OS worker threads.
//! Work runs on a fresh worker thread per task; results travel back through
//! channels that are polled by callbacks scheduled on the main loop, so
//! consumers and exception handlers always run on the loop thread and never
//! block it.
//!
//! Two kinds of poll loop exist:
//!
//! - **Subscriptions** ([`Executor::consume`]) poll a caller-owned channel
//!   every `poll_interval`, one message per tick, until paused or stopped.
//! - **Result polls** ([`Executor::run`]) poll a task's one-shot channel every
//!   `result_poll_interval` until its single outcome arrives, then end. For a
//!   synced task they also hand the synced slot to the next queued task.
//!
//! Poll ticks only hold a weak reference to the executor; once the last
//! [`Executor`] handle is dropped every pending tick becomes a no-op.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use parking_lot::Mutex;
//! use threadom::{Executor, Task, TaskError};
//! use threadom_core::MainLoop;
//!
//! let main_loop = MainLoop::new();
//! let executor = Executor::new(main_loop.clone());
//!
//! let received = Arc::new(Mutex::new(None));
//! let sink = received.clone();
//! executor
//!     .run(
//!         Task::new(|| Ok::<_, TaskError>("fetched"))
//!             .consumer(move |args| {
//!                 *sink.lock() = Some(args.parse::<String>(0)?);
//!                 Ok(())
//!             }),
//!     )
//!     .unwrap();
//!
//! assert!(main_loop.run_until(|| received.lock().is_some(), Duration::from_secs(5)));
//! assert_eq!(received.lock().as_deref(), Some("fetched"));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use threadom_core::{Schedule, TaskError};

use crate::channel::Channel;
use crate::config::{ExecutorBuilder, ExecutorConfig};
use crate::dispatch::{dispatch_exception, dispatch_result};
use crate::error::Result;
use crate::subscription::{
    ConsumeOptions, Consumer, ExceptionHandler, Registry, Subscription, SubscriptionId,
    SubscriptionInfo,
};
use crate::sync_queue::{Admission, SharedSyncQueue};
use crate::task::{Launch, Task};
use crate::worker::{self, WorkerRunner};

/// Runs work on background threads and delivers outcomes on a main loop.
///
/// Cloning yields another handle to the same executor.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

/// A weak handle to an [`Executor`].
///
/// Consumers that launch follow-up tasks should capture one of these rather
/// than an [`Executor`], which would keep the executor alive through its own
/// subscription records.
#[derive(Clone)]
pub struct WeakExecutor {
    inner: Weak<ExecutorInner>,
}

impl WeakExecutor {
    /// The executor, if it still exists.
    pub fn upgrade(&self) -> Option<Executor> {
        self.inner.upgrade().map(|inner| Executor { inner })
    }
}

impl fmt::Debug for WeakExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakExecutor")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

struct ExecutorInner {
    scheduler: Arc<dyn Schedule>,
    config: ExecutorConfig,
    registry: Mutex<Registry>,
    synced: SharedSyncQueue<Task>,
    /// Handles of non-daemon workers not yet joined.
    joinable: Mutex<Vec<JoinHandle<()>>>,
    live_workers: Arc<AtomicUsize>,
    spawned: AtomicU64,
}

/// State carried by the result poll of one launched task.
struct PendingResult {
    channel: Channel,
    label: String,
    consumer: Option<Consumer>,
    unpack_result: bool,
    upstream_handler: Option<ExceptionHandler>,
    downstream_handler: Option<ExceptionHandler>,
    synced: bool,
}

impl Executor {
    /// Create an executor with the default configuration.
    pub fn new<S>(scheduler: S) -> Self
    where
        S: Schedule + 'static,
    {
        Self::with_config(scheduler, ExecutorConfig::default())
    }

    /// Create an executor with `config`.
    pub fn with_config<S>(scheduler: S, config: ExecutorConfig) -> Self
    where
        S: Schedule + 'static,
    {
        Self::from_shared(Arc::new(scheduler), config)
    }

    /// Create an executor on an already shared scheduler.
    pub fn from_shared(scheduler: Arc<dyn Schedule>, config: ExecutorConfig) -> Self {
        tracing::debug!(
            target: "threadom::executor",
            thread_name = %config.thread_name,
            sync_by_default = config.sync_by_default,
            "executor created"
        );
        Self {
            inner: Arc::new(ExecutorInner {
                scheduler,
                config,
                registry: Mutex::new(Registry::default()),
                synced: SharedSyncQueue::new(),
                joinable: Mutex::new(Vec::new()),
                live_workers: Arc::new(AtomicUsize::new(0)),
                spawned: AtomicU64::new(0),
            }),
        }
    }

    /// Create a builder for a custom configuration.
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::new()
    }

    /// The executor's configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Create a weak handle.
    pub fn downgrade(&self) -> WeakExecutor {
        WeakExecutor {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to `channel` and start polling it.
    ///
    /// Returns `None`, doing nothing, when no channel is given.
    pub fn consume<'a>(
        &self,
        channel: impl Into<Option<&'a Channel>>,
        options: ConsumeOptions,
    ) -> Option<SubscriptionId> {
        let Some(channel) = channel.into() else {
            tracing::debug!(target: "threadom::subscription", "consume called without a channel");
            return None;
        };

        let mut subscription =
            Subscription::new(channel.clone(), options, self.inner.config.poll_interval);
        subscription.polling = true;
        let poll_interval = subscription.poll_interval;
        let id = self.inner.registry.lock().insert(subscription);

        tracing::debug!(
            target: "threadom::subscription",
            subscription = %id,
            ?poll_interval,
            "subscription registered"
        );

        self.inner.schedule_subscription_poll(id, Duration::ZERO);
        Some(id)
    }

    /// Stop polling the selected subscriptions, keeping buffered messages.
    pub fn pause(&self, id: SubscriptionId) {
        let paused = self.inner.registry.lock().pause(id);
        tracing::debug!(target: "threadom::subscription", subscription = %id, paused, "paused");
    }

    /// Restart polling the selected paused subscriptions.
    pub fn resume(&self, id: SubscriptionId) {
        let restart = self.inner.registry.lock().resume(id);
        tracing::debug!(
            target: "threadom::subscription",
            subscription = %id,
            restarted = restart.len(),
            "resumed"
        );
        for sub_id in restart {
            self.inner.schedule_subscription_poll(sub_id, Duration::ZERO);
        }
    }

    /// Remove the selected subscriptions.
    pub fn stop(&self, id: SubscriptionId) {
        let removed = self.inner.registry.lock().stop(id);
        tracing::debug!(target: "threadom::subscription", subscription = %id, removed, "stopped");
    }

    /// Snapshots of the selected subscriptions.
    ///
    /// [`SubscriptionId::ALL`] returns every record; an unknown id returns
    /// nothing.
    pub fn info(&self, id: SubscriptionId) -> Vec<SubscriptionInfo> {
        self.inner.registry.lock().info(id)
    }

    /// Snapshot of one subscription.
    pub fn subscription(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        if id.is_all() {
            return None;
        }
        self.info(id).pop()
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Launch `task` on a worker thread.
    ///
    /// A synced task that arrives while another synced task is running is
    /// queued instead and [`Launch::Queued`] is returned. It is started once
    /// every synced task queued before it has delivered its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Spawn`](crate::ExecutorError::Spawn) if the
    /// worker thread cannot be started. The synced slot is released in that
    /// case.
    pub fn run(&self, task: Task) -> Result<Launch> {
        let sync = task.sync.unwrap_or(self.inner.config.sync_by_default);
        if !sync {
            self.inner.launch(task, false)?;
            return Ok(Launch::Started);
        }

        let label = task.label().to_owned();
        match self.inner.synced.admit(task) {
            Admission::Queued(position) => {
                tracing::debug!(
                    target: "threadom::executor",
                    task = %label,
                    position,
                    "synced task queued"
                );
                Ok(Launch::Queued)
            }
            Admission::Admitted(task) => match self.inner.launch(task, true) {
                Ok(()) => Ok(Launch::Started),
                Err(error) => {
                    self.inner.advance_synced();
                    Err(error)
                }
            },
        }
    }

    /// Alias for [`run`](Self::run).
    pub fn task(&self, task: Task) -> Result<Launch> {
        self.run(task)
    }

    /// Number of synced tasks waiting for the synced slot.
    pub fn pending_synced(&self) -> usize {
        self.inner.synced.pending_count()
    }

    /// Check if a synced task holds the synced slot.
    pub fn is_synced_running(&self) -> bool {
        self.inner.synced.is_running()
    }

    /// Number of worker threads currently running work.
    pub fn active_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::SeqCst)
    }

    /// Wait for every non-daemon worker launched so far.
    ///
    /// Blocks the calling thread; do not call it from the main loop while
    /// workers may still be running. Returns the number of workers joined.
    pub fn join_workers(&self) -> usize {
        let handles = std::mem::take(&mut *self.inner.joinable.lock());
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .count()
    }

    /// Stop every subscription and drop every queued synced task.
    ///
    /// Running workers finish, and their outcomes are still delivered.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }
}

impl ExecutorInner {
    /// Spawn the worker for `task` and start polling for its outcome.
    fn launch(self: &Arc<Self>, task: Task, synced: bool) -> Result<()> {
        let Task {
            work,
            arguments,
            consumer,
            sync: _,
            daemon,
            unpack_result,
            upstream_handler,
            downstream_handler,
            name,
        } = task;

        let label = name.unwrap_or_else(|| "task".to_string());
        let daemon = daemon.unwrap_or(self.config.daemon_by_default);
        let channel = Channel::bounded(1);
        let worker_name = self
            .config
            .worker_name(self.spawned.fetch_add(1, Ordering::Relaxed));

        let runner = WorkerRunner::new(
            work,
            arguments,
            channel.clone(),
            label.clone(),
            &self.live_workers,
        );
        let handle = worker::spawn(runner, worker_name.clone(), self.config.stack_size)?;
        if !daemon {
            self.joinable.lock().push(handle);
        }

        tracing::debug!(
            target: "threadom::executor",
            task = %label,
            worker = %worker_name,
            synced,
            daemon,
            "task started"
        );

        let pending = PendingResult {
            channel,
            label,
            consumer,
            unpack_result,
            upstream_handler,
            downstream_handler,
            synced,
        };
        self.schedule_result_poll(pending, self.config.result_poll_interval);
        Ok(())
    }

    /// Pass the synced slot to the next queued task, or free it.
    ///
    /// A queued task whose worker cannot be spawned is skipped and its error
    /// is surfaced on the main loop.
    fn advance_synced(self: &Arc<Self>) {
        while let Some(task) = self.synced.finish() {
            let label = task.label().to_owned();
            match self.launch(task, true) {
                Ok(()) => return,
                Err(error) => {
                    tracing::error!(
                        target: "threadom::executor",
                        task = %label,
                        %error,
                        "failed to start queued synced task"
                    );
                    self.surface(TaskError::new(error));
                }
            }
        }
        tracing::trace!(target: "threadom::executor", "synced slot released");
    }

    /// Make `error` escape on the main loop.
    fn surface(&self, error: TaskError) {
        self.scheduler
            .schedule(Duration::ZERO, Box::new(move || Err(error)));
    }

    fn schedule_result_poll(self: &Arc<Self>, pending: PendingResult, delay: Duration) {
        let executor = Arc::downgrade(self);
        self.scheduler
            .schedule(delay, Box::new(move || poll_result(executor, pending)));
    }

    fn schedule_subscription_poll(self: &Arc<Self>, id: SubscriptionId, delay: Duration) {
        let executor = Arc::downgrade(self);
        self.scheduler
            .schedule(delay, Box::new(move || poll_subscription(executor, id)));
    }

    /// Schedule the next tick for `id` if it is still active.
    fn reschedule_subscription(self: &Arc<Self>, id: SubscriptionId) {
        let interval = {
            let mut registry = self.registry.lock();
            match registry.get_mut(id) {
                Some(subscription) if subscription.active => subscription.poll_interval,
                Some(subscription) => {
                    subscription.polling = false;
                    return;
                }
                None => return,
            }
        };
        self.schedule_subscription_poll(id, interval);
    }

    fn teardown(&self) {
        let subscriptions = self.registry.lock().stop(SubscriptionId::ALL);
        let queued = self.synced.clear();
        tracing::debug!(
            target: "threadom::executor",
            subscriptions,
            queued,
            "executor torn down"
        );
    }
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One tick of a task's result poll.
fn poll_result(
    executor: Weak<ExecutorInner>,
    pending: PendingResult,
) -> std::result::Result<(), TaskError> {
    let Some(inner) = executor.upgrade() else {
        return Ok(());
    };

    let Some(message) = pending.channel.try_recv() else {
        let delay = inner.config.result_poll_interval;
        inner.schedule_result_poll(pending, delay);
        return Ok(());
    };

    let outcome = match message {
        Ok(value) => dispatch_result(
            value,
            pending.consumer.as_ref(),
            pending.unpack_result,
            pending.downstream_handler.as_ref(),
        ),
        Err(error) => dispatch_exception(error, pending.upstream_handler.as_ref()),
    };

    tracing::debug!(
        target: "threadom::executor",
        task = %pending.label,
        escaped = outcome.is_err(),
        "task finished"
    );

    if pending.synced {
        inner.advance_synced();
    }
    outcome
}

/// One tick of a subscription's poll loop.
fn poll_subscription(
    executor: Weak<ExecutorInner>,
    id: SubscriptionId,
) -> std::result::Result<(), TaskError> {
    let Some(inner) = executor.upgrade() else {
        return Ok(());
    };

    let (channel, consumer, unpack_result, handler) = {
        let mut registry = inner.registry.lock();
        let Some(subscription) = registry.get_mut(id) else {
            tracing::trace!(target: "threadom::subscription", subscription = %id, "poll loop ended");
            return Ok(());
        };
        if !subscription.active {
            subscription.polling = false;
            tracing::trace!(target: "threadom::subscription", subscription = %id, "poll loop paused");
            return Ok(());
        }
        (
            subscription.channel.clone(),
            subscription.consumer.clone(),
            subscription.unpack_result,
            subscription.exception_handler.clone(),
        )
    };

    let outcome = match channel.try_recv() {
        Some(Ok(value)) => {
            dispatch_result(value, consumer.as_ref(), unpack_result, handler.as_ref())
        }
        Some(Err(error)) => dispatch_exception(error, handler.as_ref()),
        None => Ok(()),
    };

    inner.reschedule_subscription(id);
    outcome
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.inner.config)
            .field("subscriptions", &self.subscription_count())
            .field("pending_synced", &self.pending_synced())
            .field("active_workers", &self.active_workers())
            .finish()
    }
}

static_assertions::assert_impl_all!(Executor: Send, Sync);
static_assertions::assert_impl_all!(WeakExecutor: Send, Sync);
