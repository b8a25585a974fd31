//! The cooperative, single-threaded main loop.
//!
//! Poll ticks, consumers and exception handlers all run here. Nothing that
//! runs on the loop may block; waiting for background work is expressed as a
//! callback that reschedules itself after a short delay.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! use threadom_core::{MainLoop, Schedule};
//!
//! let main_loop = MainLoop::new();
//! let ticks = Arc::new(AtomicUsize::new(0));
//!
//! let counter = ticks.clone();
//! main_loop.schedule(
//!     Duration::from_millis(5),
//!     Box::new(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }),
//! );
//!
//! assert!(main_loop.run_until(|| ticks.load(Ordering::SeqCst) == 1, Duration::from_secs(1)));
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::TaskError;
use crate::thread_check::ThreadAffinity;
use crate::timer::{CallbackId, LoopCallback, TimerQueue, deadline_after};

/// Upper bound on a single idle wait, so quit requests and external state
/// changes are noticed even without a wakeup.
const MAX_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Receives errors that escaped a loop callback.
pub type ErrorHook = Box<dyn Fn(&TaskError) + Send + Sync>;

/// Called whenever a callback is scheduled, to wake an external event loop.
pub type Waker = Box<dyn Fn() + Send + Sync>;

/// Something that can run callbacks later on the loop thread.
///
/// This is the `schedule(delay, callback)` primitive the executor's poll
/// loops are built on. [`MainLoop`] is the stock implementation; a GUI
/// toolkit with its own timer facility can implement it directly.
pub trait Schedule: Send + Sync {
    /// Run `callback` on the loop thread once `delay` has elapsed.
    fn schedule(&self, delay: Duration, callback: LoopCallback) -> CallbackId;

    /// Cancel a pending callback. Returns `false` if it already ran or was
    /// never scheduled.
    fn cancel(&self, id: CallbackId) -> bool;
}

/// State shared between all handles to one loop.
struct LoopShared {
    /// Pending callbacks (thread-safe, any thread may schedule).
    timers: Mutex<TimerQueue>,
    /// Signalled when a callback is scheduled or quit is requested.
    wakeup: Condvar,
    /// Flag indicating the loop should stop running.
    should_quit: AtomicBool,
    /// Receives errors escaping callbacks. `None` means log them.
    error_hook: RwLock<Option<ErrorHook>>,
    /// External waker installed by host integrations.
    waker: RwLock<Option<Waker>>,
    /// The thread allowed to process callbacks.
    affinity: ThreadAffinity,
}

/// A headless main loop driving deadline-ordered callbacks.
///
/// `MainLoop` is a cheap, cloneable handle. Callbacks can be scheduled from
/// any thread, but they are only ever executed by the thread that created
/// the loop, either through [`run`](Self::run) or by a host event loop
/// calling [`process_ready`](Self::process_ready) on each iteration.
#[derive(Clone)]
pub struct MainLoop {
    shared: Arc<LoopShared>,
}

impl MainLoop {
    /// Create a loop bound to the current thread.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LoopShared {
                timers: Mutex::new(TimerQueue::new()),
                wakeup: Condvar::new(),
                should_quit: AtomicBool::new(false),
                error_hook: RwLock::new(None),
                waker: RwLock::new(None),
                affinity: ThreadAffinity::current(),
            }),
        }
    }

    /// Install a handler for errors that escape a callback.
    ///
    /// The default handler logs the error and the loop keeps running.
    pub fn set_error_hook<F>(&self, hook: F)
    where
        F: Fn(&TaskError) + Send + Sync + 'static,
    {
        *self.shared.error_hook.write() = Some(Box::new(hook));
    }

    /// Restore the default (logging) error handler.
    pub fn clear_error_hook(&self) {
        *self.shared.error_hook.write() = None;
    }

    /// Install a function called every time a callback is scheduled.
    ///
    /// Host integrations use this to wake their own event loop so that it
    /// recomputes its next deadline.
    pub fn set_waker<F>(&self, waker: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.waker.write() = Some(Box::new(waker));
    }

    /// Remove the external waker.
    pub fn clear_waker(&self) {
        *self.shared.waker.write() = None;
    }

    /// Number of callbacks waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.shared.timers.lock().len()
    }

    /// Check if `id` is still waiting to fire.
    pub fn is_scheduled(&self, id: CallbackId) -> bool {
        self.shared.timers.lock().contains(id)
    }

    /// Duration until the next callback is due, `None` if the loop is idle.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.shared.timers.lock().time_until_next()
    }

    /// The instant the next callback is due, `None` if the loop is idle.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.timers.lock().next_deadline()
    }

    /// Whether a callback is due now.
    pub fn has_ready(&self) -> bool {
        self.shared.timers.lock().has_ready(Instant::now())
    }

    /// Run every callback that is due.
    ///
    /// Callbacks are removed from the queue under the lock and executed with
    /// the lock released, so they are free to schedule follow-up callbacks.
    /// Those follow-ups never run in the same batch. A callback that panics
    /// is reported like one that returned an error, and the rest of the
    /// batch still runs. Returns the number of callbacks executed.
    #[tracing::instrument(skip(self), target = "threadom::event_loop", level = "trace")]
    pub fn process_ready(&self) -> usize {
        self.shared.affinity.debug_assert_same_thread();

        let ready = self.shared.timers.lock().take_ready(Instant::now());
        let count = ready.len();

        for (id, callback) in ready {
            tracing::trace!(target: "threadom::event_loop", ?id, "running callback");
            let outcome = panic::catch_unwind(AssertUnwindSafe(callback))
                .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
            if let Err(error) = outcome {
                self.report_unhandled(&error);
            }
        }

        count
    }

    /// Route an error that escaped a callback to the error hook.
    pub fn report_unhandled(&self, error: &TaskError) {
        match &*self.shared.error_hook.read() {
            Some(hook) => hook(error),
            None => {
                tracing::error!(
                    target: "threadom::event_loop",
                    %error,
                    "unhandled error in main loop callback"
                );
            }
        }
    }

    /// Block until a callback is due, `deadline` passes, or the loop is woken.
    fn wait(&self, deadline: Option<Instant>) {
        let mut timers = self.shared.timers.lock();
        if self.should_quit() || timers.has_ready(Instant::now()) {
            return;
        }

        let now = Instant::now();
        let mut timeout = timers.time_until_next().unwrap_or(MAX_IDLE_WAIT);
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(now));
        }
        timeout = timeout.min(MAX_IDLE_WAIT);

        if !timeout.is_zero() {
            self.shared.wakeup.wait_for(&mut timers, timeout);
        }
    }

    /// Run the loop on the current thread until [`quit`](Self::quit) is called.
    #[tracing::instrument(skip(self), target = "threadom::event_loop", level = "debug")]
    pub fn run(&self) {
        tracing::debug!(target: "threadom::event_loop", "starting main loop");
        while !self.should_quit() {
            self.process_ready();
            self.wait(None);
        }
        self.shared.should_quit.store(false, Ordering::SeqCst);
        tracing::debug!(target: "threadom::event_loop", "main loop stopped");
    }

    /// Run the loop until `predicate` returns `true` or `timeout` elapses.
    ///
    /// The predicate is checked after every batch of callbacks. Returns
    /// whether the predicate was satisfied.
    pub fn run_until<P>(&self, mut predicate: P, timeout: Duration) -> bool
    where
        P: FnMut() -> bool,
    {
        let deadline = deadline_after(Instant::now(), timeout);
        loop {
            self.process_ready();
            if predicate() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.wait(Some(deadline));
        }
    }

    /// Run the loop for `duration`, processing whatever becomes due.
    pub fn run_for(&self, duration: Duration) {
        let deadline = deadline_after(Instant::now(), duration);
        while Instant::now() < deadline {
            self.process_ready();
            self.wait(Some(deadline));
        }
        self.process_ready();
    }

    /// Ask a running loop to return.
    pub fn quit(&self) {
        tracing::debug!(target: "threadom::event_loop", "quit requested");
        self.shared.should_quit.store(true, Ordering::SeqCst);
        let _guard = self.shared.timers.lock();
        self.shared.wakeup.notify_all();
    }

    /// Check if a quit has been requested.
    pub fn should_quit(&self) -> bool {
        self.shared.should_quit.load(Ordering::SeqCst)
    }

    /// Drop every pending callback without running it.
    pub fn clear(&self) {
        self.shared.timers.lock().clear();
    }

    /// Check if the current thread is the loop thread.
    pub fn is_loop_thread(&self) -> bool {
        self.shared.affinity.is_same_thread()
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule for MainLoop {
    fn schedule(&self, delay: Duration, callback: LoopCallback) -> CallbackId {
        let id = {
            let mut timers = self.shared.timers.lock();
            let id = timers.schedule(delay, callback);
            self.shared.wakeup.notify_all();
            id
        };

        if let Some(waker) = &*self.shared.waker.read() {
            waker();
        }

        id
    }

    fn cancel(&self, id: CallbackId) -> bool {
        self.shared.timers.lock().cancel(id)
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("pending", &self.pending_count())
            .field("should_quit", &self.should_quit())
            .finish()
    }
}

static_assertions::assert_impl_all!(MainLoop: Send, Sync);
