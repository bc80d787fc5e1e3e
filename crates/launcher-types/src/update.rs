//! Update items, events and notifications.
//!
//! These are the payloads crossing the boundary between the update engine
//! and the UI bridge. `UpdateItem` is ephemeral: it exists between a plan
//! and its execution and is never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of updatable packages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageId {
    /// The launcher itself (self-update).
    Launcher,
    /// The bundled Java runtime.
    Jre,
    /// The game client.
    Game,
}

/// Error returned when parsing an unknown package name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown package: {0}")]
pub struct PackageParseError(pub String);

impl PackageId {
    /// All packages in the fixed order the executor processes them.
    pub const ORDERED: [PackageId; 3] = [PackageId::Launcher, PackageId::Jre, PackageId::Game];

    /// The package identifier as used in state files and events.
    pub fn as_str(self) -> &'static str {
        match self {
            PackageId::Launcher => "launcher",
            PackageId::Jre => "jre",
            PackageId::Game => "game",
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageId {
    type Err = PackageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launcher" => Ok(PackageId::Launcher),
            "jre" => Ok(PackageId::Jre),
            "game" => Ok(PackageId::Game),
            other => Err(PackageParseError(other.to_string())),
        }
    }
}

/// A pending update for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    /// Package this update applies to.
    pub name: PackageId,
    /// Version the update installs.
    pub version: String,
    /// Currently installed version, empty for a fresh install.
    #[serde(default)]
    pub current_version: String,
    /// Whether play must be disabled until this update is applied.
    #[serde(default)]
    pub is_blocking: bool,
    /// Download size in bytes, zero if unknown.
    #[serde(default)]
    pub size: u64,
    /// Human-readable description of the update.
    #[serde(default)]
    pub description: String,
}

/// A named event emitted during update processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Event identifier, e.g. `checking` or `complete`.
    pub name: String,
    /// Package the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageId>,
    /// Version involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Error details for `error` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateEvent {
    /// An event with just a name.
    pub fn named(name: &str) -> UpdateEvent {
        UpdateEvent {
            name: name.to_string(),
            package: None,
            version: None,
            error: None,
        }
    }

    /// An event scoped to a package.
    pub fn package(name: &str, package: PackageId) -> UpdateEvent {
        UpdateEvent {
            name: name.to_string(),
            package: Some(package),
            version: None,
            error: None,
        }
    }

    /// An `error` event carrying the failure text.
    pub fn error(package: PackageId, error: impl fmt::Display) -> UpdateEvent {
        UpdateEvent {
            name: "error".to_string(),
            package: Some(package),
            version: None,
            error: Some(error.to_string()),
        }
    }
}

/// A progress notification for a long-running operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotification {
    /// Package being processed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageId>,
    /// Overall progress in `[0, 1]`.
    pub progress: f64,
    /// Bytes downloaded so far.
    #[serde(default)]
    pub bytes_downloaded: u64,
    /// Expected total bytes, zero if unknown.
    #[serde(default)]
    pub bytes_total: u64,
    /// Current download speed in bytes per second.
    #[serde(default)]
    pub speed: u64,
}
