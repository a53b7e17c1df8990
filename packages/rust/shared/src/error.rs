//! Error types for pubcompare.
//!
//! Library crates use [`PubCompareError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all pubcompare operations.
#[derive(Debug, thiserror::Error)]
pub enum PubCompareError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A stage's port call did not finish within its deadline.
    #[error("stage `{stage}` timed out after {}s", limit.as_secs_f64())]
    StageTimeout { stage: String, limit: Duration },

    /// The generative model, search tool or agent failed (network, auth, quota).
    #[error("{port} failed: {message}")]
    Port { port: String, message: String },

    /// Model output could not be read as structured data and strict mode is on.
    #[error("stage `{stage}` produced unstructured output")]
    UnparseableOutput { stage: String },

    /// A stage was invoked out of the fixed pipeline order.
    #[error("stage `{stage}` cannot run after `{found}` (expected after `{expected}`)")]
    StageOrder {
        stage: String,
        expected: String,
        found: String,
    },

    /// Writing a run artifact failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// HTTP error talking to an external provider.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty query, missing selection, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PubCompareError>;

impl PubCompareError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a port failure for the named collaborator.
    pub fn port(port: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Port {
            port: port.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a deadline overrun.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StageTimeout { .. })
    }
}
