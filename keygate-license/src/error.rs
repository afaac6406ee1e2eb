//! Error types for the licensing crate.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The artifact file is not well-formed (bad JSON envelope, I/O failure).
    #[error("invalid license artifact: {0}")]
    InvalidArtifact(String),

    /// Signature verification failed, or the signed bytes are damaged.
    ///
    /// Covers bad base64, wrong signature length, signature mismatch, and
    /// signed payload bytes that do not parse. A verifier must treat all of
    /// these identically: the artifact cannot be trusted.
    #[error("license signature invalid or payload corrupt")]
    ForgedOrCorrupt,

    /// License expiry is in the past.
    #[error("license expired on {0}")]
    Expired(String),

    /// License is bound to a different hardware id.
    #[error("license bound to hardware id {bound}, observed {observed}")]
    HwidMismatch {
        /// Hardware id the license was issued for.
        bound: String,
        /// Hardware id presented at verification time.
        observed: String,
    },

    /// Key material is missing, unreadable, or malformed.
    ///
    /// Fatal during issuance: no artifact may be written.
    #[error("key error: {0}")]
    Key(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error reading or writing an artifact file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
