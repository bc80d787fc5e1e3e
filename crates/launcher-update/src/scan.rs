//! Installed-build scanning, uninstall and deletion.
//!
//! Walks the known channel directories under the storage root, loads each
//! channel's state and reports the game builds installed there. Uninstall
//! and user-data deletion both report per-file progress so the UI can show
//! long deletions moving.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use launcher_store::{AppState, BlobStore, Paths, LKG_DEP};
use launcher_types::{Channel, PackageId};

use crate::error::UpdateError;

/// One discovered game install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInstall {
    /// Channel the install belongs to.
    pub channel: Channel,
    /// Dependency slot (`game` or `lkg`).
    pub slot: String,
    /// Installed version string.
    pub version: String,
    /// Install directory.
    pub dir: PathBuf,
    /// Whether a signature file exists beside the install.
    pub has_signature: bool,
}

/// Per-file deletion progress callback, called once per removed file.
pub type DeleteProgressFn = dyn Fn(u64) + Send + Sync;

/// Scan the storage root for installed game builds.
///
/// Channels whose state fails to load are skipped with a warning; an
/// unreadable channel must not break the settings surface.
pub fn scan_installed_games(store: &BlobStore, paths: &Paths) -> Vec<GameInstall> {
    let mut installs = Vec::new();

    for channel in Channel::ALL {
        if !paths.channel_dir(channel).is_dir() {
            continue;
        }

        let state = match AppState::load(store, paths, channel) {
            Ok(state) => state,
            Err(err) if err.is_not_found() => continue,
            Err(err) => {
                warn!(channel = %channel, error = %err, "error loading state during scan");
                continue;
            }
        };

        for slot in [PackageId::Game.as_str(), LKG_DEP] {
            let Some(dep) = state.dependency(slot) else {
                continue;
            };
            let install = GameInstall {
                channel,
                slot: slot.to_string(),
                version: dep.version.clone(),
                dir: dep.path.clone(),
                has_signature: dep.sig_path().is_file(),
            };
            debug!(channel = %channel, slot, version = %install.version, "found game install");
            installs.push(install);
        }
    }

    installs
}

/// Total size in bytes of all regular files under `dir`.
pub fn dir_size(dir: &Path) -> u64 {
    let mut size = 0;
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }

    size
}

/// Delete every file under `dir` with per-file progress, then remove the
/// tree itself.
pub fn delete_dir_with_progress(
    dir: &Path,
    progress: Option<&DeleteProgressFn>,
) -> Result<(), UpdateError> {
    info!(dir = %dir.display(), "scanning directory for deletion");

    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }

    info!(total = files.len(), "deleting files");
    let mut deleted: u64 = 0;
    for file in files {
        std::fs::remove_file(&file)?;
        deleted += 1;
        if let Some(progress) = progress {
            progress(deleted);
        }
    }

    std::fs::remove_dir_all(dir).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    Ok(())
}

/// Remove one game install: the directory, its signature, its dependency
/// record, and the whole channel tree when nothing remains installed.
pub fn uninstall_game(
    store: &BlobStore,
    paths: &Paths,
    state: &mut AppState,
    install: &GameInstall,
    progress: Option<&DeleteProgressFn>,
) -> Result<(), UpdateError> {
    info!(channel = %install.channel, dir = %install.dir.display(), "uninstalling game install");

    if install.dir.exists() {
        delete_dir_with_progress(&install.dir, progress)?;
    }

    if let Some(dep) = state.dependency(&install.slot) {
        let sig = dep.sig_path();
        if let Err(err) = std::fs::remove_file(&sig) {
            if err.kind() != std::io::ErrorKind::NotFound {
                error!(sig = %sig.display(), error = %err, "failed to remove signature file");
            }
        }
    }

    state.set_dependency(&install.slot, "uninstall", None);
    state.save(store, paths, "uninstall_game_version");

    let any_left = state.dependency(PackageId::Game.as_str()).is_some()
        || state.dependency(LKG_DEP).is_some();
    if !any_left {
        let channel_dir = paths.channel_dir(install.channel);
        info!(dir = %channel_dir.display(), "removing channel directory, no packages remain");
        std::fs::remove_dir_all(&channel_dir).or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Ok(())
            } else {
                Err(e)
            }
        })?;
    }

    Ok(())
}
