//! Core systems for Threadom.
//!
//! This crate provides the loop side of the Threadom task executor:
//!
//! - **Main Loop**: a cooperative, single-threaded loop of deadline-ordered
//!   callbacks ([`MainLoop`]), usable headless or pumped by a GUI event loop
//! - **Schedule**: the `schedule(delay, callback)` seam the executor's poll
//!   loops are built on ([`Schedule`])
//! - **Task Errors**: the error value carried from background work back to
//!   the loop thread ([`TaskError`])
//! - **Thread Checks**: affinity assertions for loop-thread-only code
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use threadom_core::{MainLoop, Schedule, TaskError};
//!
//! let main_loop = MainLoop::new();
//!
//! main_loop.set_error_hook(|error| eprintln!("unhandled: {error}"));
//!
//! main_loop.schedule(
//!     Duration::from_millis(1),
//!     Box::new(|| Err(TaskError::msg("reported through the hook"))),
//! );
//!
//! main_loop.run_for(Duration::from_millis(10));
//! ```

mod error;
mod event_loop;
pub mod logging;
pub mod thread_check;
mod timer;
#[cfg(feature = "winit")]
mod winit_pump;

pub use error::{MessageError, PanicError, Result, TaskError};
pub use event_loop::{ErrorHook, MainLoop, Schedule, Waker};
pub use timer::{CallbackId, LoopCallback};
#[cfg(feature = "winit")]
pub use winit_pump::WinitPump;
