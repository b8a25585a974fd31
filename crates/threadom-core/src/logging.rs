//! Logging targets for Threadom.
//!
//! Threadom uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```
//! use threadom_core::logging::targets;
//!
//! let filter = format!("{}=debug,{}=trace", targets::EXECUTOR, targets::WORKER);
//! let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
//! ```
//!
//! Poll ticks log at `trace`, subscription and task lifecycle at `debug`.
//! Errors that escape a loop callback are logged at `error` by the default
//! unhandled-error hook.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Main loop target.
    pub const EVENT_LOOP: &str = "threadom::event_loop";
    /// Task launcher and synced queue target.
    pub const EXECUTOR: &str = "threadom::executor";
    /// Worker thread target.
    pub const WORKER: &str = "threadom::worker";
    /// Long-lived subscription target.
    pub const SUBSCRIPTION: &str = "threadom::subscription";
}
