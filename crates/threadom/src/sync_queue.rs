//! Admission control for synced tasks.
//!
//! At most one synced task runs at a time. A synced task that arrives while
//! another is running waits in a FIFO and is handed the slot when its
//! predecessor finishes.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Outcome of asking for the synced slot.
#[derive(Debug)]
pub(crate) enum Admission<T> {
    /// The slot was free and now belongs to this task.
    Admitted(T),
    /// Another task holds the slot; this one waits at the given position.
    Queued(usize),
}

/// Busy flag plus waiting tasks.
#[derive(Debug)]
pub(crate) struct SyncQueue<T> {
    running: bool,
    pending: VecDeque<T>,
}

impl<T> SyncQueue<T> {
    pub fn new() -> Self {
        Self {
            running: false,
            pending: VecDeque::new(),
        }
    }

    /// Take the slot if it is free, otherwise append `task` to the FIFO.
    pub fn admit(&mut self, task: T) -> Admission<T> {
        if self.running {
            self.pending.push_back(task);
            Admission::Queued(self.pending.len())
        } else {
            self.running = true;
            Admission::Admitted(task)
        }
    }

    /// Release the slot held by the finished task.
    ///
    /// If a task is waiting the slot passes straight to it and it is
    /// returned; otherwise the slot becomes free.
    pub fn finish(&mut self) -> Option<T> {
        let next = self.pending.pop_front();
        self.running = next.is_some();
        next
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every waiting task. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

impl<T> Default for SyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper around `SyncQueue`.
///
/// Each operation is one critical section, so the check of the busy flag and
/// setting it can never be split between two callers.
pub(crate) struct SharedSyncQueue<T> {
    inner: Mutex<SyncQueue<T>>,
}

impl<T> SharedSyncQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SyncQueue::new()),
        }
    }

    pub fn admit(&self, task: T) -> Admission<T> {
        self.inner.lock().admit(task)
    }

    pub fn finish(&self) -> Option<T> {
        self.inner.lock().finish()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_running()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending_count()
    }

    pub fn clear(&self) -> usize {
        self.inner.lock().clear()
    }
}

impl<T> Default for SharedSyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
