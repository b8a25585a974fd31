//! Background task executor for single-threaded main loops.
//!
//! GUI toolkits run everything on one thread that must never block. This
//! crate lets that thread hand blocking work to worker threads and receive
//! the outcomes back on itself:
//!
//! - **Tasks**: one-shot work launched with [`Executor::run`], each on its
//!   own worker thread, with the result handed to a consumer on the loop
//! - **Synced Tasks**: tasks serialized against each other through a FIFO
//! - **Subscriptions**: long-lived polling of a [`Channel`] fed by your own
//!   producers, with pause/resume/stop ([`Executor::consume`])
//! - **Error Routing**: upstream (work) and downstream (consumer) exception
//!   handlers; unhandled errors escape on the loop and reach its error hook
//!
//! The loop side lives in [`threadom_core`]; any [`Schedule`] implementation
//! can host an executor, and [`MainLoop`] is the one provided.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use parking_lot::Mutex;
//! use threadom::prelude::*;
//!
//! let main_loop = MainLoop::new();
//! let executor = Executor::new(main_loop.clone());
//!
//! let progress = create_channel();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let id = executor
//!     .consume(
//!         &progress,
//!         ConsumeOptions::new().consumer(move |args| {
//!             sink.lock().push(args.parse::<u32>(0)?);
//!             Ok(())
//!         }),
//!     )
//!     .unwrap();
//!
//! let producer = progress.clone();
//! executor
//!     .run(Task::new(move || {
//!         for percent in [25, 50, 100] {
//!             producer.send(percent);
//!         }
//!         Ok::<_, TaskError>(())
//!     }))
//!     .unwrap();
//!
//! assert!(main_loop.run_until(|| seen.lock().len() == 3, Duration::from_secs(5)));
//! assert_eq!(*seen.lock(), vec![25, 50, 100]);
//! executor.stop(id);
//! ```

pub mod arguments;
pub mod channel;
pub mod config;
mod dispatch;
mod error;
mod executor;
pub mod subscription;
mod sync_queue;
pub mod task;
mod worker;

pub use arguments::Arguments;
pub use channel::{Channel, Message, create_channel};
pub use config::{ExecutorBuilder, ExecutorConfig};
pub use error::{ExecutorError, Result};
pub use executor::{Executor, WeakExecutor};
pub use subscription::{ConsumeOptions, Consumer, ExceptionHandler, SubscriptionId, SubscriptionInfo};
pub use task::{Launch, Task};

pub use threadom_core::{MainLoop, Schedule, TaskError};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::arguments::Arguments;
    pub use crate::channel::{Channel, create_channel};
    pub use crate::config::{ExecutorBuilder, ExecutorConfig};
    pub use crate::error::ExecutorError;
    pub use crate::executor::{Executor, WeakExecutor};
    pub use crate::subscription::{ConsumeOptions, SubscriptionId, SubscriptionInfo};
    pub use crate::task::{Launch, Task};

    pub use threadom_core::{MainLoop, Schedule, TaskError};
}
