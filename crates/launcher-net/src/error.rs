//! Network error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the HTTP surface.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The launcher is in offline mode and a network call was attempted.
    #[error("launcher is in offline mode")]
    Offline,

    /// The operation was cancelled. Propagated, never logged as a failure.
    #[error("operation cancelled")]
    Cancelled,

    /// A non-success status the caller cannot interpret.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Downloaded bytes did not match the expected digest.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        /// File that failed verification.
        path: PathBuf,
        /// Expected SHA-256, lowercase hex.
        expected: String,
        /// Computed SHA-256, lowercase hex.
        actual: String,
    },

    /// No usable session: missing account, missing profile, or a refresh
    /// the server rejected.
    #[error("authentication required: {0}")]
    Auth(String),

    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure while spooling a download.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether this error is the cooperative-cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
