//! Worker threads.
//!
//! Each launched task gets one OS thread that runs its work to completion
//! and writes the tagged outcome to the task's channel. Panics are caught and
//! delivered as errors; nothing is re-raised on the worker thread, so every
//! failure is surfaced on the main loop by the result poller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use threadom_core::TaskError;

use crate::arguments::Arguments;
use crate::channel::Channel;
use crate::error::{ExecutorError, Result};
use crate::task::Work;

/// Counts a worker as live until dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Body of one worker thread.
pub(crate) struct WorkerRunner {
    work: Work,
    arguments: Arguments,
    channel: Channel,
    label: String,
    live: LiveGuard,
}

impl WorkerRunner {
    pub(crate) fn new(
        work: Work,
        arguments: Arguments,
        channel: Channel,
        label: String,
        live: &Arc<AtomicUsize>,
    ) -> Self {
        Self {
            work,
            arguments,
            channel,
            label,
            live: LiveGuard::new(live),
        }
    }

    fn run(self) {
        let Self {
            work,
            arguments,
            channel,
            label,
            live,
        } = self;

        tracing::trace!(target: "threadom::worker", task = %label, "worker started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || work(arguments)))
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));

        if let Err(error) = &outcome {
            tracing::warn!(
                target: "threadom::worker",
                task = %label,
                %error,
                "task failed, error will be surfaced on the main loop"
            );
        }

        // No longer counted by the time the poller sees the outcome.
        drop(live);
        tracing::trace!(target: "threadom::worker", task = %label, "worker finished");

        channel.send_message(outcome);
    }
}

/// Start `runner` on a new thread called `name`.
pub(crate) fn spawn(
    runner: WorkerRunner,
    name: String,
    stack_size: Option<usize>,
) -> Result<JoinHandle<()>> {
    let mut builder = thread::Builder::new().name(name.clone());
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    // On failure the runner is dropped here, releasing its live count.
    builder
        .spawn(move || runner.run())
        .map_err(|source| ExecutorError::spawn(name, source))
}
