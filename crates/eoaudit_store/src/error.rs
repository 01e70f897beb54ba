//! Error types for object store access.

use thiserror::Error;

/// Object store operation result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Object store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Listing failed and retrying will not help (access denied, no such bucket, ...)
    #[error("Listing failed for prefix '{prefix}': {message}")]
    Listing { prefix: String, message: String },

    /// Throttling, timeouts, dropped connections. Safe to retry.
    #[error("Transient failure listing prefix '{prefix}': {message}")]
    Transient { prefix: String, message: String },

    /// The backend answered with something we cannot interpret
    #[error("Invalid listing response: {0}")]
    InvalidResponse(String),

    /// Client could not be configured
    #[error("Store configuration error: {0}")]
    Config(String),

    /// The operation was cancelled between pages
    #[error("Listing cancelled")]
    Cancelled,
}

impl StoreError {
    /// Create a permanent listing error.
    pub fn listing(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listing {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create a transient (retryable) listing error.
    pub fn transient(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Classifies errors for the retry loop.
pub trait Transient {
    /// True when the same request may succeed if repeated.
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}
