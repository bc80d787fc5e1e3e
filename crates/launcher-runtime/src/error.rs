//! Runtime error type.

use thiserror::Error;

use launcher_launch::LaunchError;
use launcher_net::FetchError;
use launcher_store::StoreError;
use launcher_update::UpdateError;

/// Failures surfaced by the operations façade.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// No channel has been selected yet.
    #[error("no channel selected")]
    NoChannel,

    /// An update-apply task is already running.
    #[error("an update is already in progress")]
    AlreadyUpdating,

    /// A blocking update must be applied before playing.
    #[error("a blocking update is pending")]
    BlockingUpdatePending,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Network failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Update engine failure.
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// Launch failure.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl LauncherError {
    /// Whether the UI should route to login.
    pub fn is_auth(&self) -> bool {
        match self {
            LauncherError::Launch(err) => err.is_auth(),
            LauncherError::Fetch(FetchError::Auth(_)) => true,
            _ => false,
        }
    }

    /// Whether this is the cooperative-cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        match self {
            LauncherError::Update(err) => err.is_cancelled(),
            LauncherError::Fetch(err) => err.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        let err = LauncherError::Launch(LaunchError::Auth("no session".to_string()));
        assert!(err.is_auth());
        assert!(!LauncherError::NoChannel.is_auth());
    }

    #[test]
    fn test_cancelled_classification() {
        let err = LauncherError::Update(UpdateError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!LauncherError::AlreadyUpdating.is_cancelled());
    }
}
