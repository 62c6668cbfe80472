//! Error types for the rescue alert engine

use crate::canonical::CanonicalError;

/// Result type alias using the engine's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rescue alert operations
///
/// Ambiguous evaluation requests are not errors; they resolve to a
/// fail-closed decision. These variants cover conditions where the caller
/// must not proceed at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The event log holds no evaluation request
    #[error("event log contains no evaluate_requested event")]
    MissingEvaluateRequest,

    /// Canonical encoding failed
    #[error("canonical encoding error: {0}")]
    Canonical(#[from] CanonicalError),

    /// Incremental projection and replay disagree
    #[error("projection drift: incremental {incremental} != replayed {replayed}")]
    ProjectionDrift {
        incremental: String,
        replayed: String,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Event log or payload could not be parsed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
