//! Storage directory layout.
//!
//! Single source of truth for where launcher data lives. The scheme under
//! the storage root:
//!
//! ```text
//! <root>/
//!   <channel>/env.{json|dat}                  per-channel state
//!   <channel>/package/<pkg>/<version>/...     installed package trees
//!   <channel>/package/game/<version>.sig      wharf signatures
//!   account.{json|dat}                        account document
//!   selfupdate.{json|dat}                     self-update cleanup note
//!   player_profiles.json                      offline uuid map
//!   player.txt                                last offline player name
//!   cache/                                    download scratch
//! ```

use std::path::{Path, PathBuf};

use launcher_types::{Channel, PackageId};

/// Environment variable overriding the storage root on all platforms.
pub const DATA_DIR_ENV: &str = "XDG_DATA_HOME";

/// Directory name under the platform data location.
const APP_DIR: &str = "hytale";

/// Resolved storage locations for one launcher instance.
///
/// Constructed once at startup and injected everywhere paths are needed;
/// tests point it at a temp directory with [`Paths::with_root`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve the storage root from the environment.
    ///
    /// `XDG_DATA_HOME` wins when set and non-empty; otherwise the platform
    /// data directory, with `/tmp` as a last resort when the platform gives
    /// us nothing.
    pub fn detect() -> Paths {
        let base = std::env::var(DATA_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| PathBuf::from("/tmp"));

        Paths {
            root: base.join(APP_DIR),
        }
    }

    /// A `Paths` rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Paths {
        Paths { root: root.into() }
    }

    /// The storage root itself.
    pub fn storage_dir(&self) -> &Path {
        &self.root
    }

    /// A file or directory directly under the storage root.
    pub fn in_storage(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The tree for one channel.
    pub fn channel_dir(&self, channel: Channel) -> PathBuf {
        self.root.join(channel.as_str())
    }

    /// The install directory for one package version.
    pub fn package_dir(&self, pkg: PackageId, channel: Channel, version: &str) -> PathBuf {
        self.channel_dir(channel)
            .join("package")
            .join(pkg.as_str())
            .join(version)
    }

    /// Download scratch space.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Base path (extension added by the blob store) of a channel's state file.
    pub fn state_file_base(&self, channel: Channel) -> PathBuf {
        self.channel_dir(channel).join("env")
    }

    /// Base path of the account document.
    pub fn account_file_base(&self) -> PathBuf {
        self.root.join("account")
    }

    /// Base path of the self-update cleanup note.
    pub fn cleanup_note_base(&self) -> PathBuf {
        self.root.join("selfupdate")
    }

    /// The offline player profile map.
    pub fn player_profiles_file(&self) -> PathBuf {
        self.root.join("player_profiles.json")
    }

    /// The last offline player name.
    pub fn player_name_file(&self) -> PathBuf {
        self.root.join("player.txt")
    }

    /// The launcher's own log file.
    pub fn log_file(&self) -> PathBuf {
        self.root.join("hytale-launcher.log")
    }

    /// Captured local server output.
    pub fn server_log_file(&self) -> PathBuf {
        self.root.join("server.log")
    }
}
