//! Long-lived channel subscriptions.
//!
//! A subscription polls one [`Channel`] from the main loop, handing each
//! message to its consumer or exception handler, until it is paused or
//! stopped. Records live in a [`Registry`] keyed by [`SubscriptionId`];
//! poll ticks look their record up by id, so stopping a subscription simply
//! makes its next tick a no-op.

use std::collections::BTreeMap;
use std::collections::btree_map::{Range, RangeMut};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use threadom_core::TaskError;

use crate::arguments::Arguments;
use crate::channel::Channel;

/// Callback receiving successful results on the loop thread.
pub type Consumer = Arc<dyn Fn(Arguments) -> Result<(), TaskError> + Send + Sync>;

/// Callback receiving errors on the loop thread.
///
/// An error the handler returns is not caught again; it escapes on the loop.
pub type ExceptionHandler = Arc<dyn Fn(TaskError) -> Result<(), TaskError> + Send + Sync>;

/// Identifier of a subscription.
///
/// Raw value 0 is [`SubscriptionId::ALL`], the wildcard accepted by
/// [`pause`](crate::Executor::pause), [`resume`](crate::Executor::resume),
/// [`stop`](crate::Executor::stop) and [`info`](crate::Executor::info).
/// Ids handed out by [`consume`](crate::Executor::consume) are never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wildcard selecting every subscription.
    pub const ALL: Self = Self(0);

    /// Create an id from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the wildcard.
    pub const fn is_all(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubscriptionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Options for [`Executor::consume`](crate::Executor::consume).
#[derive(Clone, Default)]
pub struct ConsumeOptions {
    pub(crate) consumer: Option<Consumer>,
    pub(crate) unpack_result: bool,
    pub(crate) exception_handler: Option<ExceptionHandler>,
    pub(crate) poll_interval: Option<Duration>,
}

impl ConsumeOptions {
    /// Options with no consumer, no handler and the executor's poll interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consumer invoked with each result.
    pub fn consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(Arguments) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    /// Unpack results into arguments before calling the consumer.
    pub fn unpack_result(mut self, unpack: bool) -> Self {
        self.unpack_result = unpack;
        self
    }

    /// Set the handler for error messages and consumer failures.
    pub fn exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    /// Set the delay between poll ticks.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

impl fmt::Debug for ConsumeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumeOptions")
            .field("has_consumer", &self.consumer.is_some())
            .field("unpack_result", &self.unpack_result)
            .field("has_exception_handler", &self.exception_handler.is_some())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Snapshot of a subscription record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub active: bool,
    pub unpack_result: bool,
    pub has_consumer: bool,
    pub has_exception_handler: bool,
    pub poll_interval: Duration,
    /// Messages waiting in the channel.
    pub buffered: usize,
}

pub(crate) struct Subscription {
    pub(crate) channel: Channel,
    pub(crate) active: bool,
    /// A poll tick is scheduled for this record.
    pub(crate) polling: bool,
    pub(crate) consumer: Option<Consumer>,
    pub(crate) unpack_result: bool,
    pub(crate) exception_handler: Option<ExceptionHandler>,
    pub(crate) poll_interval: Duration,
}

impl Subscription {
    pub(crate) fn new(channel: Channel, options: ConsumeOptions, default_interval: Duration) -> Self {
        Self {
            channel,
            active: true,
            polling: false,
            consumer: options.consumer,
            unpack_result: options.unpack_result,
            exception_handler: options.exception_handler,
            poll_interval: options.poll_interval.unwrap_or(default_interval),
        }
    }

    fn info(&self, id: SubscriptionId) -> SubscriptionInfo {
        SubscriptionInfo {
            id,
            active: self.active,
            unpack_result: self.unpack_result,
            has_consumer: self.consumer.is_some(),
            has_exception_handler: self.exception_handler.is_some(),
            poll_interval: self.poll_interval,
            buffered: self.channel.len(),
        }
    }
}

/// Subscription records keyed by id.
pub(crate) struct Registry {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            next_id: 1,
            subscriptions: BTreeMap::new(),
        }
    }
}

impl Registry {
    /// Store `subscription` under a fresh id.
    pub(crate) fn insert(&mut self, subscription: Subscription) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(id, subscription);
        id
    }

    pub(crate) fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    fn select(&self, id: SubscriptionId) -> Range<'_, SubscriptionId, Subscription> {
        if id.is_all() {
            self.subscriptions.range::<SubscriptionId, _>(..)
        } else {
            self.subscriptions.range(id..=id)
        }
    }

    fn select_mut(&mut self, id: SubscriptionId) -> RangeMut<'_, SubscriptionId, Subscription> {
        if id.is_all() {
            self.subscriptions.range_mut::<SubscriptionId, _>(..)
        } else {
            self.subscriptions.range_mut(id..=id)
        }
    }

    /// Deactivate the selected records. Returns how many were active.
    pub(crate) fn pause(&mut self, id: SubscriptionId) -> usize {
        let mut paused = 0;
        for (_, subscription) in self.select_mut(id) {
            if subscription.active {
                subscription.active = false;
                paused += 1;
            }
        }
        paused
    }

    /// Reactivate the selected records.
    ///
    /// Returns the records that have no poll tick scheduled and need one;
    /// they are marked as polling.
    pub(crate) fn resume(&mut self, id: SubscriptionId) -> Vec<SubscriptionId> {
        let mut restart = Vec::new();
        for (&sub_id, subscription) in self.select_mut(id) {
            if subscription.active {
                continue;
            }
            subscription.active = true;
            if !subscription.polling {
                subscription.polling = true;
                restart.push(sub_id);
            }
        }
        restart
    }

    /// Remove the selected records. Returns how many were removed.
    pub(crate) fn stop(&mut self, id: SubscriptionId) -> usize {
        if id.is_all() {
            let removed = self.subscriptions.len();
            self.subscriptions.clear();
            removed
        } else {
            usize::from(self.subscriptions.remove(&id).is_some())
        }
    }

    /// Snapshots of the selected records.
    pub(crate) fn info(&self, id: SubscriptionId) -> Vec<SubscriptionInfo> {
        self.select(id)
            .map(|(&sub_id, subscription)| subscription.info(sub_id))
            .collect()
    }
}
