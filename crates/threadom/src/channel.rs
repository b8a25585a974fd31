//! Hand-off channels between background producers and main-loop pollers.
//!
//! A [`Channel`] connects exactly one producer (a worker thread) with exactly
//! one consumer (a poll loop on the main loop). Messages are tagged: each one
//! is either a result value or a [`TaskError`], so a poller never has to
//! guess whether a placeholder value means "no error".
//!
//! ```
//! use threadom::channel::create_channel;
//!
//! let channel = create_channel();
//! let producer = channel.clone();
//!
//! std::thread::spawn(move || {
//!     producer.send(42);
//! })
//! .join()
//! .unwrap();
//!
//! let message = channel.try_recv().unwrap();
//! assert_eq!(message.unwrap(), 42);
//! assert!(channel.is_empty());
//! ```

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use serde::Serialize;
use serde_json::Value;
use threadom_core::TaskError;

use crate::error::Result;

/// One message carried by a channel: a result or an error.
pub type Message = std::result::Result<Value, TaskError>;

/// Create an unbounded channel.
pub fn create_channel() -> Channel {
    Channel::unbounded()
}

/// A FIFO hand-off queue carrying [`Message`]s.
///
/// Cloning a channel yields another handle to the same queue; give one clone
/// to the producer and subscribe the other with
/// [`Executor::consume`](crate::Executor::consume).
#[derive(Clone)]
pub struct Channel {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Channel {
    /// Create a channel with no capacity limit.
    pub fn unbounded() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Create a channel holding at most `capacity` messages.
    ///
    /// Producers block while the channel is full, so never send on a bounded
    /// channel from the main loop.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Send a result value.
    pub fn send(&self, value: impl Into<Value>) {
        self.send_message(Ok(value.into()));
    }

    /// Serialize `value` and send it as a result.
    pub fn send_serialized<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.send_message(Ok(value));
        Ok(())
    }

    /// Send an error.
    pub fn send_error(&self, error: impl Into<TaskError>) {
        self.send_message(Err(error.into()));
    }

    /// Send a tagged message.
    ///
    /// Never fails: every handle also owns the receiving side, so the
    /// channel stays connected for as long as a sender exists.
    pub fn send_message(&self, message: Message) {
        let _ = self.sender.send(message);
    }

    /// Pop the oldest message without blocking.
    pub fn try_recv(&self) -> Option<Message> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if no messages are buffered.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The capacity limit, `None` for unbounded channels.
    pub fn capacity(&self) -> Option<usize> {
        self.sender.capacity()
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

static_assertions::assert_impl_all!(Channel: Send, Sync);
