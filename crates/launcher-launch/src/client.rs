//! Game client launch.
//!
//! Composes argv for the client executable and spawns it detached with
//! stdout inherited. The launcher does not supervise the client; once the
//! process is up, its lifetime belongs to the player.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;
use uuid::Uuid;

use crate::error::LaunchError;

/// Client executable name under the install's `Client/` directory.
#[cfg(windows)]
const CLIENT_EXECUTABLE: &str = "hytale-client.exe";
#[cfg(not(windows))]
const CLIENT_EXECUTABLE: &str = "hytale-client";

/// How the launched client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAuth {
    /// Offline launch with a deterministic player identity.
    Offline {
        /// Offline player UUID (v5 of the name).
        uuid: Uuid,
        /// Player display name.
        name: String,
    },
    /// Online launch with live session tokens.
    Online {
        /// Profile UUID.
        uuid: Uuid,
        /// Player display name.
        name: String,
        /// Session token for the game services.
        session_token: String,
        /// Identity token for the player.
        identity_token: String,
        /// Profile identifier passed through to the client.
        profile_id: String,
    },
}

/// Everything needed to spawn the game client.
#[derive(Debug, Clone)]
pub struct ClientLaunch {
    /// Game install directory (`--app-dir`).
    pub app_dir: PathBuf,
    /// Per-user writable directory (`--user-dir`), created if missing.
    pub user_dir: PathBuf,
    /// Java executable under the JRE install (`--java-exec`).
    pub java_exec: PathBuf,
    /// Authentication shape.
    pub auth: LaunchAuth,
    /// Extra pass-through arguments.
    pub extra_args: Vec<String>,
}

impl ClientLaunch {
    /// The client executable inside `app_dir`.
    pub fn executable(&self) -> Result<PathBuf, LaunchError> {
        let candidate = self.app_dir.join("Client").join(CLIENT_EXECUTABLE);
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(LaunchError::ExecutableNotFound(self.app_dir.clone()))
        }
    }

    /// The composed argv, excluding the program itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--app-dir".to_string(),
            self.app_dir.display().to_string(),
            "--user-dir".to_string(),
            self.user_dir.display().to_string(),
            "--java-exec".to_string(),
            self.java_exec.display().to_string(),
        ];

        match &self.auth {
            LaunchAuth::Offline { uuid, name } => {
                args.extend([
                    "--auth-mode".to_string(),
                    "offline".to_string(),
                    "--uuid".to_string(),
                    uuid.to_string(),
                    "--name".to_string(),
                    name.clone(),
                ]);
            }
            LaunchAuth::Online {
                uuid,
                name,
                session_token,
                identity_token,
                profile_id,
            } => {
                args.extend([
                    "--auth-mode".to_string(),
                    "online".to_string(),
                    "--uuid".to_string(),
                    uuid.to_string(),
                    "--name".to_string(),
                    name.clone(),
                    "--sessionToken".to_string(),
                    session_token.clone(),
                    "--identityToken".to_string(),
                    identity_token.clone(),
                    "--profileId".to_string(),
                    profile_id.clone(),
                ]);
            }
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Spawn the client detached. Returns the child pid.
    pub fn spawn(&self) -> Result<u32, LaunchError> {
        std::fs::create_dir_all(&self.user_dir)?;
        let executable = self.executable()?;
        let args = self.args();

        info!(
            executable = %executable.display(),
            app_dir = %self.app_dir.display(),
            "launching game client"
        );

        let mut command = Command::new(&executable);
        command
            .args(&args)
            .current_dir(&self.app_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdin(Stdio::null());

        suppress_console(&mut command);

        let child = command.spawn()?;
        Ok(child.id())
    }
}

/// Keep the client from opening a console window.
#[cfg(windows)]
fn suppress_console(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn suppress_console(_command: &mut Command) {}

/// Convenience for callers needing only the path check.
pub fn client_executable_exists(app_dir: &Path) -> bool {
    app_dir.join("Client").join(CLIENT_EXECUTABLE).is_file()
}
