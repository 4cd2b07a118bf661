//! Error types for the relay core.

use thiserror::Error;

use crate::backend::BackendId;

/// Fatal configuration errors, raised before the relay serves traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No backend credential was provided.
    #[error("No inference backend configured. Set at least one of GROQ_API_KEY, OPENROUTER_API_KEY, HF_API_TOKEN.")]
    NoBackends,

    /// A backend named in the priority order is unknown.
    #[error("Unknown backend in {var}: {name}")]
    UnknownBackend {
        /// Environment variable holding the list.
        var: &'static str,
        /// The unrecognized name.
        name: String,
    },

    /// A numeric setting could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Environment variable name.
        var: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Reasons a single backend call failed.
///
/// These never reach the user; the dispatcher moves on to the next backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend answered with a non-success HTTP status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The response body did not have a recognizable shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The generated text was present but empty.
    #[error("empty generated text")]
    Empty,

    /// The call exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Malformed(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Voice synthesis failures. The adapter degrades these to text output.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No synthesis program is installed.
    #[error("speech synthesis not available: {0}")]
    Unavailable(String),

    /// The synthesis program ran but failed.
    #[error("synthesis command failed: {0}")]
    CommandFailed(String),

    /// The synthesis program did not finish in time.
    #[error("synthesis timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// Filesystem failure while producing the artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the router's administrative operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The requested backend has no credentials in this process.
    #[error("Backend not configured: {0}")]
    BackendNotConfigured(BackendId),
}

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RelayError>;
