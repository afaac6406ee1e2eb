//! Error types for the activation crate.

use thiserror::Error;

/// Activation-specific errors.
///
/// Variants map one-to-one onto the HTTP failure responses of the
/// activation API.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// A required field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The hardware id is already activated; no new code is issued.
    #[error("device already activated")]
    AlreadyActivated,

    /// No pending activation exists for this hardware id.
    #[error("no pending activation request")]
    NoPendingRequest,

    /// The pending code outlived its TTL. Terminal: the pending record is
    /// deleted and the client must request a fresh code.
    #[error("activation code expired")]
    CodeExpired,

    /// The presented code does not match. The pending record is retained,
    /// so retries are permitted until TTL expiry.
    #[error("activation code invalid")]
    InvalidCode,

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for ActivationError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result type for activation operations.
pub type ActivationResult<T> = Result<T, ActivationError>;
