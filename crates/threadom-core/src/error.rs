//! The error value transported from background work to the main loop.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// An error raised by background work, a consumer, or an exception handler.
///
/// `TaskError` is the "exception object" that travels through a channel from
/// a worker thread to the main loop. It is cheap to clone and can be built
/// from any `std::error::Error + Send + Sync + 'static`, so work closures can
/// use `?` freely:
///
/// ```
/// use threadom_core::TaskError;
///
/// fn parse(input: &str) -> Result<i64, TaskError> {
///     Ok(input.trim().parse::<i64>()?)
/// }
///
/// assert_eq!(parse(" 42 ").unwrap(), 42);
/// assert!(parse("nope").is_err());
/// ```
///
/// Like `anyhow::Error`, this type does not itself implement
/// `std::error::Error`; that is what makes the blanket `From` conversion
/// possible. Use [`TaskError::as_error`] to get at the underlying error.
#[derive(Clone)]
pub struct TaskError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

/// A plain-text error, produced by [`TaskError::msg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError(pub String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

/// A panic caught on a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// The panic payload rendered as text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task panicked: {}", self.message)
    }
}

impl StdError for PanicError {}

impl TaskError {
    /// Wrap an existing error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Create an error from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(MessageError(message.to_string()))
    }

    /// Build an error from a panic payload returned by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self::new(PanicError { message })
    }

    /// Whether this error came from a caught panic.
    pub fn is_panic(&self) -> bool {
        self.inner.is::<PanicError>()
    }

    /// Borrow the underlying error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    /// Downcast the underlying error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }
}

impl<E> From<E> for TaskError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskError").field(&self.inner).finish()
    }
}

impl AsRef<dyn StdError + Send + Sync + 'static> for TaskError {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.as_error()
    }
}

/// A specialized Result type for callbacks that run on the main loop.
pub type Result<T> = std::result::Result<T, TaskError>;
