//! Executor configuration.
//!
//! ```
//! use std::time::Duration;
//!
//! use threadom::{Executor, ExecutorBuilder};
//! use threadom_core::MainLoop;
//!
//! let main_loop = MainLoop::new();
//! let executor: Executor = ExecutorBuilder::new()
//!     .thread_name("fetcher")
//!     .sync_by_default(true)
//!     .poll_interval(Duration::from_millis(20))
//!     .build(main_loop.clone());
//!
//! assert!(executor.config().sync_by_default);
//! ```

use std::sync::Arc;
use std::time::Duration;

use threadom_core::Schedule;

use crate::executor::Executor;

/// Default delay between long-lived poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default delay between short-poll ticks while awaiting a task result.
pub const DEFAULT_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Configuration for an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name prefix for worker threads. Workers are named `{thread_name}-{n}`.
    pub thread_name: String,
    /// Stack size for worker threads in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Whether tasks are synced unless they say otherwise.
    pub sync_by_default: bool,
    /// Whether workers are detached unless the task says otherwise.
    pub daemon_by_default: bool,
    /// Poll interval for subscriptions that do not set one.
    pub poll_interval: Duration,
    /// Delay between checks for a task's result.
    pub result_poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: "threadom-worker".to_string(),
            stack_size: None,
            sync_by_default: false,
            daemon_by_default: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            result_poll_interval: DEFAULT_RESULT_POLL_INTERVAL,
        }
    }
}

impl ExecutorConfig {
    /// Create a new configuration with the given worker thread name.
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        Self {
            thread_name: name.into(),
            ..Default::default()
        }
    }

    /// Name for the `n`th worker thread.
    pub(crate) fn worker_name(&self, n: u64) -> String {
        format!("{}-{}", self.thread_name, n)
    }
}

/// Builder for creating Executors with custom configuration.
#[derive(Debug, Default)]
pub struct ExecutorBuilder {
    config: ExecutorConfig,
}

impl ExecutorBuilder {
    /// Create a new ExecutorBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the stack size for worker threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the executor-level default for synced tasks.
    pub fn sync_by_default(mut self, sync: bool) -> Self {
        self.config.sync_by_default = sync;
        self
    }

    /// Set the executor-level default for detached workers.
    pub fn daemon_by_default(mut self, daemon: bool) -> Self {
        self.config.daemon_by_default = daemon;
        self
    }

    /// Set the default subscription poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the delay between checks for a task's result.
    pub fn result_poll_interval(mut self, interval: Duration) -> Self {
        self.config.result_poll_interval = interval;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Build an executor scheduling its poll loops on `scheduler`.
    pub fn build<S>(self, scheduler: S) -> Executor
    where
        S: Schedule + 'static,
    {
        Executor::with_config(scheduler, self.config)
    }

    /// Build an executor on an already shared scheduler.
    pub fn build_shared(self, scheduler: Arc<dyn Schedule>) -> Executor {
        Executor::from_shared(scheduler, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.thread_name, "threadom-worker");
        assert_eq!(config.stack_size, None);
        assert!(!config.sync_by_default);
        assert!(config.daemon_by_default);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.result_poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_builder() {
        let builder = ExecutorBuilder::new()
            .thread_name("io")
            .stack_size(256 * 1024)
            .sync_by_default(true)
            .daemon_by_default(false)
            .poll_interval(Duration::from_millis(25))
            .result_poll_interval(Duration::from_millis(1));

        let config = builder.config();
        assert_eq!(config.thread_name, "io");
        assert_eq!(config.stack_size, Some(256 * 1024));
        assert!(config.sync_by_default);
        assert!(!config.daemon_by_default);
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert_eq!(config.result_poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_worker_names() {
        let config = ExecutorConfig::with_thread_name("zip");
        assert_eq!(config.worker_name(0), "zip-0");
        assert_eq!(config.worker_name(12), "zip-12");
    }
}
