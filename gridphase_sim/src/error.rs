//! Error types for the GridPhase harness.

use thiserror::Error;

/// Errors raised by the on-disk run store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Run artifacts are written once; a second write is refused
    #[error("Run already stored: {0}")]
    AlreadyStored(String),
}

impl StoreError {
    /// Creates an already-stored error.
    pub fn already_stored(run_id: impl Into<String>) -> Self {
        Self::AlreadyStored(run_id.into())
    }
}
