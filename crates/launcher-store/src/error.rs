//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the on-disk stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file or secret that is allowed to be absent.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// Corrupt ciphertext, a bad GCM tag, or an undecodable document.
    #[error("integrity failure in {path}: {reason}")]
    Integrity {
        /// File the failure was detected in.
        path: PathBuf,
        /// What failed.
        reason: String,
    },

    /// A state file written on a different platform.
    #[error("platform mismatch: state written for {saved}, running on {current}")]
    PlatformMismatch {
        /// Platform recorded in the state file.
        saved: String,
        /// Platform of the running binary.
        current: String,
    },

    /// The platform secret store refused or failed.
    #[error("keyring error for {name}: {reason}")]
    Keyring {
        /// Key name being accessed.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error means "the file simply is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// An integrity error for `path`.
    pub fn integrity(path: impl Into<PathBuf>, reason: impl ToString) -> StoreError {
        StoreError::Integrity {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
