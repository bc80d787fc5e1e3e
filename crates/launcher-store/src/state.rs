//! Per-channel application state.
//!
//! One `env.{json|dat}` document per channel, recording the platform the
//! channel was installed on and every installed dependency. The platform
//! is write-once: a state file loaded on a different platform fails with
//! an integrity error and is never silently migrated.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use launcher_types::{Channel, PackageId, Platform};

use crate::blob::BlobStore;
use crate::error::StoreError;
use crate::paths::Paths;

/// Keyring secret name for state-file encryption.
const STATE_KEY_NAME: &str = "B7F94324-4365-4EB7-A3FC-7FADAA2EEA2F";

/// Dependency slot holding the previous game install kept for rollback.
pub const LKG_DEP: &str = "lkg";

/// One installed package recorded in the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package identifier (`game`, `jre`, `launcher` or `lkg`).
    pub name: String,
    /// Installed version string.
    pub version: String,
    /// Monotonically increasing build number, per package per channel.
    pub build_id: u64,
    /// Absolute directory containing the installed artifacts.
    pub path: PathBuf,
}

impl Dependency {
    /// Path of the wharf signature file validating [`Dependency::path`].
    ///
    /// The signature sits beside the install directory as `<version>.sig`.
    /// Derived from the version rather than the directory name, so it stays
    /// valid after the install is demoted into a numbered build directory.
    pub fn sig_path(&self) -> PathBuf {
        let name = format!("{}.sig", self.version);
        match self.path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Persistent record of one channel's install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Channel this state belongs to.
    pub channel: Channel,
    /// Platform recorded at install time. Write-once.
    pub platform: Platform,
    /// Installed dependencies by package name.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    /// Whether everything needed for offline launch is present and verified.
    #[serde(default)]
    pub offline_ready: bool,
    /// True only for a state that has never been persisted. Derived, never
    /// serialized.
    #[serde(skip)]
    pub is_new: bool,
}

impl AppState {
    /// A fresh state for `channel` on the current platform.
    pub fn new(channel: Channel) -> AppState {
        AppState {
            channel,
            platform: Platform::current(),
            dependencies: BTreeMap::new(),
            offline_ready: false,
            is_new: true,
        }
    }

    /// Load the state for `channel` from disk.
    ///
    /// `StoreError::NotFound` when the channel has never been installed;
    /// integrity errors when the document is undecodable or was written on
    /// a different platform.
    pub fn load(store: &BlobStore, paths: &Paths, channel: Channel) -> Result<AppState, StoreError> {
        let file = store.dat_file(&paths.state_file_base(channel));
        let data = store.read(&file, STATE_KEY_NAME)?;

        let state: AppState = serde_json::from_slice(&data)
            .map_err(|e| StoreError::integrity(&file, format!("undecodable state: {e}")))?;

        let current = Platform::current();
        if state.platform != current {
            return Err(StoreError::PlatformMismatch {
                saved: state.platform.id(),
                current: current.id(),
            });
        }

        Ok(state)
    }

    /// Persist the state, logging `cause`.
    ///
    /// Failures are logged and reported but never raised; a save that loses
    /// the race against disk trouble must not take the update pipeline down.
    pub fn save(&mut self, store: &BlobStore, paths: &Paths, cause: &str) {
        debug!(channel = %self.channel, cause, "saving launcher state");
        if let Err(err) = self.write_file(store, paths) {
            error!(channel = %self.channel, cause, error = %err, "failed to save launcher state");
        }
        self.is_new = false;
    }

    /// Persist the state, surfacing the error.
    pub fn write_file(&self, store: &BlobStore, paths: &Paths) -> Result<(), StoreError> {
        let file = store.dat_file(&paths.state_file_base(self.channel));
        let data = serde_json::to_vec(self)
            .map_err(|e| StoreError::integrity(&file, format!("unserializable state: {e}")))?;
        store.write(&file, STATE_KEY_NAME, &data)
    }

    /// Remove the on-disk state file for `channel`, ignoring absence.
    pub fn remove_file(store: &BlobStore, paths: &Paths, channel: Channel) -> Result<(), StoreError> {
        let file = store.dat_file(&paths.state_file_base(channel));
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The dependency record for `name`, if installed.
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.get(name)
    }

    /// The dependency record for a package.
    pub fn package_dependency(&self, pkg: PackageId) -> Option<&Dependency> {
        self.dependency(pkg.as_str())
    }

    /// Install or remove a dependency record.
    ///
    /// `tag` is a diagnostic label for the log line. Passing `None` removes
    /// the record; a second insert under the same name replaces the first.
    pub fn set_dependency(&mut self, name: &str, tag: &str, dep: Option<Dependency>) {
        match dep {
            Some(dep) => {
                debug!(name, tag, version = %dep.version, "recording dependency");
                self.dependencies.insert(name.to_string(), dep);
            }
            None => {
                debug!(name, tag, "clearing dependency");
                self.dependencies.remove(name);
            }
        }
        self.offline_ready = self.has_offline_dependencies();
    }

    /// Whether the packages required for an offline launch are recorded.
    pub fn has_offline_dependencies(&self) -> bool {
        self.dependency(PackageId::Game.as_str()).is_some()
            && self.dependency(PackageId::Jre.as_str()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::{Keyring, MemorySecretStore};
    use std::sync::Arc;

    fn fixture() -> (tempfile::TempDir, BlobStore, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
        let store = BlobStore::new(Arc::new(keyring), false);
        let paths = Paths::with_root(dir.path());
        (dir, store, paths)
    }

    fn game_dep(build_id: u64) -> Dependency {
        Dependency {
            name: "game".to_string(),
            version: format!("build-{build_id}"),
            build_id,
            path: PathBuf::from(format!("/data/release/package/game/build-{build_id}")),
        }
    }

    #[test]
    fn test_new_state_is_new() {
        let state = AppState::new(Channel::Release);
        assert!(state.is_new);
        assert_eq!(state.platform, Platform::current());
        assert!(state.dependencies.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store, paths) = fixture();
        let mut state = AppState::new(Channel::Release);
        state.set_dependency("game", "test", Some(game_dep(42)));
        state.save(&store, &paths, "test_round_trip");
        assert!(!state.is_new);

        let loaded = AppState::load(&store, &paths, Channel::Release).unwrap();
        assert!(!loaded.is_new);
        assert_eq!(loaded.dependency("game"), Some(&game_dep(42)));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (_dir, store, paths) = fixture();
        let err = AppState::load(&store, &paths, Channel::Beta).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_platform_mismatch_fails_load() {
        let (_dir, store, paths) = fixture();
        let mut state = AppState::new(Channel::Release);
        state.platform = Platform {
            os: "plan9".to_string(),
            arch: "mips".to_string(),
        };
        state.write_file(&store, &paths).unwrap();

        let err = AppState::load(&store, &paths, Channel::Release).unwrap_err();
        assert!(matches!(err, StoreError::PlatformMismatch { .. }));
    }

    #[test]
    fn test_corrupt_state_is_integrity_error() {
        let (_dir, store, paths) = fixture();
        let file = store.dat_file(&paths.state_file_base(Channel::Release));
        store.write(&file, "B7F94324-4365-4EB7-A3FC-7FADAA2EEA2F", b"not json").unwrap();

        let err = AppState::load(&store, &paths, Channel::Release).unwrap_err();
        assert!(matches!(err, StoreError::Integrity { .. }));
    }

    #[test]
    fn test_set_dependency_replaces_and_removes() {
        let mut state = AppState::new(Channel::Release);
        state.set_dependency("game", "install", Some(game_dep(1)));
        state.set_dependency("game", "upgrade", Some(game_dep(2)));
        assert_eq!(state.dependency("game").unwrap().build_id, 2);

        state.set_dependency("game", "uninstall", None);
        assert_eq!(state.dependency("game"), None);
    }

    #[test]
    fn test_offline_ready_tracks_game_and_jre() {
        let mut state = AppState::new(Channel::Release);
        state.set_dependency("game", "t", Some(game_dep(1)));
        assert!(!state.offline_ready);

        state.set_dependency(
            "jre",
            "t",
            Some(Dependency {
                name: "jre".to_string(),
                version: "17.0.9".to_string(),
                build_id: 1,
                path: PathBuf::from("/data/release/package/jre/17.0.9"),
            }),
        );
        assert!(state.offline_ready);

        state.set_dependency("jre", "t", None);
        assert!(!state.offline_ready);
    }

    #[test]
    fn test_sig_path_sits_beside_install() {
        let dep = game_dep(42);
        assert_eq!(
            dep.sig_path(),
            PathBuf::from("/data/release/package/game/build-42.sig")
        );
    }

    #[test]
    fn test_sig_path_survives_demotion_rename() {
        // A demoted install moves to a numbered directory, but its version
        // (and therefore its signature file) does not change.
        let mut dep = game_dep(42);
        dep.path = PathBuf::from("/data/release/package/game/lkg-42");
        assert_eq!(
            dep.sig_path(),
            PathBuf::from("/data/release/package/game/build-42.sig")
        );
    }

    #[test]
    fn test_remove_file_then_reset() {
        let (_dir, store, paths) = fixture();
        let mut state = AppState::new(Channel::Release);
        state.save(&store, &paths, "initial");

        AppState::remove_file(&store, &paths, Channel::Release).unwrap();
        assert!(AppState::load(&store, &paths, Channel::Release)
            .unwrap_err()
            .is_not_found());

        // Absence is not an error.
        AppState::remove_file(&store, &paths, Channel::Release).unwrap();
    }
}
