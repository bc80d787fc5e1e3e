//! Release channels.
//!
//! A channel names a release track and selects the manifests and the
//! on-disk tree used for an install. The vocabulary is closed: anything
//! outside it is rejected at parse time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named release track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Public release builds.
    Release,
    /// Public beta builds.
    Beta,
    /// Early-access alpha builds.
    Alpha,
    /// Internal development builds.
    Dev,
}

/// Error returned when parsing an unknown channel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel: {0}")]
pub struct ChannelParseError(pub String);

impl Channel {
    /// All known channels, in descending stability order.
    pub const ALL: [Channel; 4] = [
        Channel::Release,
        Channel::Beta,
        Channel::Alpha,
        Channel::Dev,
    ];

    /// The channel name as it appears in URLs, directories and state files.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Release => "release",
            Channel::Beta => "beta",
            Channel::Alpha => "alpha",
            Channel::Dev => "dev",
        }
    }

    /// Whether `name` belongs to the closed channel vocabulary.
    pub fn is_known(name: &str) -> bool {
        name.parse::<Channel>().is_ok()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(Channel::Release),
            "beta" => Ok(Channel::Beta),
            "alpha" => Ok(Channel::Alpha),
            "dev" => Ok(Channel::Dev),
            other => Err(ChannelParseError(other.to_string())),
        }
    }
}
