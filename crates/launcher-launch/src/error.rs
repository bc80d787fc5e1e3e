//! Launch error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while launching the game or the local server.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No usable session for an online launch. Surfaced distinctly so the
    /// UI can route to login.
    #[error("authentication required: {0}")]
    Auth(String),

    /// The game dependency is not recorded for this channel.
    #[error("game is not installed")]
    GameNotInstalled,

    /// The Java runtime dependency is not recorded for this channel.
    #[error("java runtime is not installed")]
    JavaNotInstalled,

    /// No launchable binary under the install directory.
    #[error("executable not found under {0}")]
    ExecutableNotFound(PathBuf),

    /// A local server is already being supervised.
    #[error("server is already running")]
    ServerAlreadyRunning,

    /// No supervised server to act on.
    #[error("server is not running")]
    ServerNotRunning,

    /// Process or filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Whether this is the auth failure the UI redirects to login for.
    pub fn is_auth(&self) -> bool {
        matches!(self, LaunchError::Auth(_))
    }
}
