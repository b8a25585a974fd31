//! Deadline-ordered heap of one-shot main-loop callbacks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

use crate::error::Result;

new_key_type! {
    /// A unique identifier for a scheduled callback.
    pub struct CallbackId;
}

/// Stand-in for deadlines too far out for `Instant` to represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The instant `delay` from `now`, clamped to a distant deadline on overflow.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// A callback run once on the main loop.
///
/// An `Err` return is an error that escaped the callback; the loop hands it
/// to its unhandled-error hook.
pub type LoopCallback = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// An entry in the deadline queue (min-heap by fire time, then sequence).
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: CallbackId,
    fire_time: Instant,
    sequence: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we want the earliest deadline
        // on top. Equal deadlines run in the order they were scheduled.
        other
            .fire_time
            .cmp(&self.fire_time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Pending callbacks keyed by id, plus the deadline heap.
pub(crate) struct TimerQueue {
    callbacks: SlotMap<CallbackId, LoopCallback>,
    queue: BinaryHeap<QueueEntry>,
    sequence: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            callbacks: SlotMap::with_key(),
            queue: BinaryHeap::new(),
            sequence: 0,
        }
    }

    /// Schedule `callback` to fire after `delay`.
    pub fn schedule(&mut self, delay: Duration, callback: LoopCallback) -> CallbackId {
        let fire_time = deadline_after(Instant::now(), delay);
        let id = self.callbacks.insert(callback);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.queue.push(QueueEntry {
            id,
            fire_time,
            sequence,
        });
        id
    }

    /// Remove a pending callback. Its heap entry goes stale and is skipped.
    pub fn cancel(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(id).is_some()
    }

    pub fn contains(&self, id: CallbackId) -> bool {
        self.callbacks.contains_key(id)
    }

    fn drop_stale_front(&mut self) {
        while let Some(entry) = self.queue.peek() {
            if self.callbacks.contains_key(entry.id) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Time until the earliest live deadline, `None` if nothing is pending.
    pub fn time_until_next(&mut self) -> Option<Duration> {
        self.drop_stale_front();
        self.queue
            .peek()
            .map(|entry| entry.fire_time.saturating_duration_since(Instant::now()))
    }

    /// The earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.drop_stale_front();
        self.queue.peek().map(|entry| entry.fire_time)
    }

    pub fn has_ready(&mut self, now: Instant) -> bool {
        self.drop_stale_front();
        self.queue.peek().is_some_and(|entry| entry.fire_time <= now)
    }

    /// Remove and return every callback whose deadline is at or before `now`,
    /// in firing order.
    pub fn take_ready(&mut self, now: Instant) -> Vec<(CallbackId, LoopCallback)> {
        let mut ready = Vec::new();

        while let Some(entry) = self.queue.peek() {
            if entry.fire_time > now {
                break;
            }
            let Some(entry) = self.queue.pop() else {
                break;
            };
            if let Some(callback) = self.callbacks.remove(entry.id) {
                ready.push((entry.id, callback));
            }
        }

        ready
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Drop every pending callback without running it.
    pub fn clear(&mut self) {
        self.callbacks.clear();
        self.queue.clear();
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
