//! Error types for the Picket environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
///
/// These surface from collaborators (audit sink, downstream push target)
/// whose failures are fail-open by design: callers log them and move on.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Collaborator unreachable or rejected the request
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Record serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
}

impl EnvError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a timeout error.
    pub fn timeout(ms: u64) -> Self {
        Self::Timeout(ms)
    }
}
