//! Common error types for the Privacy Shield.

use thiserror::Error;

/// Top-level error type for Privacy Shield operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key derivation could not run (primitive unavailable or misconfigured).
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// Authenticated decryption failed.
    ///
    /// Carries no detail: a wrong key and a corrupted envelope must be
    /// indistinguishable to the caller.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Encryption primitive failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted in the current session state.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failing action can be retried by the user (e.g. unlock
    /// with a different passphrase).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Derivation(_) | Error::DecryptionFailed)
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
