//! Error types for the executor API.

/// Result type alias for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Errors returned by executor operations.
///
/// These describe failures of the executor itself. Failures of the work it
/// runs travel as [`TaskError`](threadom_core::TaskError) values instead.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The operating system refused to start a worker thread.
    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be converted to a channel payload.
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ExecutorError {
    /// Create a spawn error.
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }
}
