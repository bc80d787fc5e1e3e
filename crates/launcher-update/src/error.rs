//! Update engine error types.

use std::path::PathBuf;

use thiserror::Error;

use launcher_net::FetchError;
use launcher_store::StoreError;

/// Errors produced by the update engine.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// An archive member would land outside the destination directory.
    #[error("illegal file path in archive: {0}")]
    PathEscape(String),

    /// Archive extension not in the supported set.
    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    /// The patch container is malformed or fails its own digests.
    #[error("invalid patch {path}: {reason}")]
    InvalidPatch {
        /// Patch file being read.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// A freshly applied tree failed verification against its signature.
    #[error("verification failed for {dir}: {missing} missing, {corrupted} corrupted")]
    VerifyFailed {
        /// Tree that failed.
        dir: PathBuf,
        /// Missing file count.
        missing: usize,
        /// Corrupted file count.
        corrupted: usize,
    },

    /// Cooperative cancellation observed mid-step.
    #[error("update cancelled")]
    Cancelled,

    /// Network failure from the fetcher.
    #[error(transparent)]
    Fetch(FetchError),

    /// State or blob store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Zip container failure.
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Whether this error is the cancellation signal (in either layer).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdateError::Cancelled)
            || matches!(self, UpdateError::Fetch(e) if e.is_cancelled())
    }

    /// An invalid-patch error for `path`.
    pub fn invalid_patch(path: impl Into<PathBuf>, reason: impl ToString) -> UpdateError {
        UpdateError::InvalidPatch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<FetchError> for UpdateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => UpdateError::Cancelled,
            other => UpdateError::Fetch(other),
        }
    }
}
