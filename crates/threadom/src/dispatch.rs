//! Result and error dispatch on the loop thread.
//!
//! A consumer or handler that panics is treated as if it had returned the
//! panic as an error, so the poll loop that called it carries on.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use threadom_core::TaskError;

use crate::arguments::Arguments;
use crate::subscription::{Consumer, ExceptionHandler};

/// Hand a result to `consumer`.
///
/// An error returned by the consumer goes to `handler`; without a handler it
/// is returned so it escapes on the loop. A missing consumer drops the result.
pub(crate) fn dispatch_result(
    value: Value,
    consumer: Option<&Consumer>,
    unpack_result: bool,
    handler: Option<&ExceptionHandler>,
) -> Result<(), TaskError> {
    let Some(consumer) = consumer else {
        return Ok(());
    };

    let arguments = Arguments::from_result(value, unpack_result);
    match guarded(|| consumer(arguments)) {
        Ok(()) => Ok(()),
        Err(error) => dispatch_exception(error, handler),
    }
}

/// Hand an error to `handler`, or return it when there is none.
///
/// Whatever the handler itself returns is passed through unchanged.
pub(crate) fn dispatch_exception(
    error: TaskError,
    handler: Option<&ExceptionHandler>,
) -> Result<(), TaskError> {
    match handler {
        Some(handler) => guarded(|| handler(error)),
        None => Err(error),
    }
}

fn guarded<F>(call: F) -> Result<(), TaskError>
where
    F: FnOnce() -> Result<(), TaskError>,
{
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
}
