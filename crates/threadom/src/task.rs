//! Background tasks.
//!
//! A [`Task`] bundles the work to run on a worker thread with everything the
//! executor needs to deliver its outcome on the main loop: the consumer, the
//! two exception handlers and the launch flags.
//!
//! ```
//! use threadom::{Arguments, Task, TaskError};
//!
//! let task = Task::with_arguments(Arguments::new().arg(20).arg(22), |args| {
//!     let a: i64 = args.parse(0)?;
//!     let b: i64 = args.parse(1)?;
//!     Ok::<_, TaskError>(a + b)
//! })
//! .name("add")
//! .sync(true)
//! .consumer(|args| {
//!     println!("sum: {}", args.parse::<i64>(0)?);
//!     Ok(())
//! });
//!
//! assert_eq!(task.label(), "add");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use threadom_core::TaskError;

use crate::arguments::Arguments;
use crate::subscription::{Consumer, ExceptionHandler};

/// The work a task runs on its worker thread.
pub(crate) type Work = Box<dyn FnOnce(Arguments) -> Result<Value, TaskError> + Send + 'static>;

fn encode<R, E>(outcome: Result<R, E>) -> Result<Value, TaskError>
where
    R: Serialize,
    E: Into<TaskError>,
{
    let value = outcome.map_err(Into::into)?;
    Ok(serde_json::to_value(value)?)
}

/// Whether [`Executor::run`](crate::Executor::run) started a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// A worker thread is running the task.
    Started,
    /// The task is synced and waits for the running synced task.
    Queued,
}

impl Launch {
    /// Check if the task was started right away.
    pub fn is_started(self) -> bool {
        matches!(self, Launch::Started)
    }
}

/// A unit of background work plus its delivery settings.
pub struct Task {
    pub(crate) work: Work,
    pub(crate) arguments: Arguments,
    pub(crate) consumer: Option<Consumer>,
    pub(crate) sync: Option<bool>,
    pub(crate) daemon: Option<bool>,
    pub(crate) unpack_result: bool,
    pub(crate) upstream_handler: Option<ExceptionHandler>,
    pub(crate) downstream_handler: Option<ExceptionHandler>,
    pub(crate) name: Option<String>,
}

impl Task {
    fn from_work(arguments: Arguments, work: Work) -> Self {
        Self {
            work,
            arguments,
            consumer: None,
            sync: None,
            daemon: None,
            unpack_result: false,
            upstream_handler: None,
            downstream_handler: None,
            name: None,
        }
    }

    /// A task running fallible `work` with no arguments.
    pub fn new<F, R, E>(work: F) -> Self
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        R: Serialize + 'static,
        E: Into<TaskError> + 'static,
    {
        Self::from_work(Arguments::new(), Box::new(move |_| encode(work())))
    }

    /// A task running `work` with `arguments`.
    pub fn with_arguments<F, R, E>(arguments: Arguments, work: F) -> Self
    where
        F: FnOnce(Arguments) -> Result<R, E> + Send + 'static,
        R: Serialize + 'static,
        E: Into<TaskError> + 'static,
    {
        Self::from_work(arguments, Box::new(move |args| encode(work(args))))
    }

    /// A task running infallible `work`.
    pub fn from_fn<F, R>(work: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: Serialize + 'static,
    {
        Self::from_work(
            Arguments::new(),
            Box::new(move |_| Ok(serde_json::to_value(work())?)),
        )
    }

    /// Set the consumer invoked with the result on the main loop.
    pub fn consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(Arguments) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    /// Serialize this task against other synced tasks.
    ///
    /// Unset, the executor's `sync_by_default` applies.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Detach the worker thread instead of keeping it for
    /// [`join_workers`](crate::Executor::join_workers).
    ///
    /// Unset, the executor's `daemon_by_default` applies.
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = Some(daemon);
        self
    }

    /// Unpack the result into arguments before calling the consumer.
    pub fn unpack_result(mut self, unpack: bool) -> Self {
        self.unpack_result = unpack;
        self
    }

    /// Set the handler for errors raised by the work itself.
    pub fn upstream_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.upstream_handler = Some(Arc::new(handler));
        self
    }

    /// Set the handler for errors raised by the consumer.
    pub fn downstream_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.downstream_handler = Some(Arc::new(handler));
        self
    }

    /// Name the task in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The task's name, or `"task"` when unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("task")
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("sync", &self.sync)
            .field("daemon", &self.daemon)
            .field("unpack_result", &self.unpack_result)
            .field("has_consumer", &self.consumer.is_some())
            .field("has_upstream_handler", &self.upstream_handler.is_some())
            .field("has_downstream_handler", &self.downstream_handler.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_work_encodes_results() {
        let task = Task::new(|| Ok::<_, TaskError>(vec![1, 2]));
        assert_eq!((task.work)(task.arguments).unwrap(), json!([1, 2]));

        let task = Task::from_fn(|| "done");
        assert_eq!((task.work)(task.arguments).unwrap(), json!("done"));
    }

    #[test]
    fn test_work_receives_arguments() {
        let task = Task::with_arguments(Arguments::new().kwarg_value("n", 4), |args| {
            let n: u32 = args.parse_kwarg("n")?;
            Ok::<_, TaskError>(n * n)
        });
        assert_eq!((task.work)(task.arguments).unwrap(), json!(16));
    }

    #[test]
    fn test_work_errors_convert() {
        let task = Task::new(|| {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::NotFound, "no repo"))
        });
        let error = (task.work)(task.arguments).unwrap_err();
        assert_eq!(error.to_string(), "no repo");
        assert!(error.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_defaults_and_builder() {
        let task = Task::from_fn(|| ());
        assert_eq!(task.label(), "task");
        assert_eq!(task.sync, None);
        assert_eq!(task.daemon, None);
        assert!(!task.unpack_result);
        assert!(task.arguments.is_empty());

        let task = task
            .name("zip")
            .sync(true)
            .daemon(false)
            .unpack_result(true)
            .consumer(|_| Ok(()))
            .upstream_exception_handler(|_| Ok(()))
            .downstream_exception_handler(|_| Ok(()));
        assert_eq!(task.label(), "zip");
        assert_eq!(task.sync, Some(true));
        assert_eq!(task.daemon, Some(false));
        assert!(task.unpack_result);
        assert!(task.consumer.is_some());
        assert!(task.upstream_handler.is_some());
        assert!(task.downstream_handler.is_some());
    }

    #[test]
    fn test_launch() {
        assert!(Launch::Started.is_started());
        assert!(!Launch::Queued.is_started());
    }
}
