//! Install platform identity.
//!
//! The (os, arch) pair is recorded in every state file at install time.
//! Loading a state written for a different platform is a hard error, so
//! the names here must stay stable across releases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An (os, arch) pair, e.g. `linux-amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system: `windows`, `darwin` or `linux`.
    pub os: String,
    /// CPU architecture: `amd64` or `arm64`.
    pub arch: String,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Platform {
        Platform {
            os: current_os().to_string(),
            arch: current_arch().to_string(),
        }
    }

    /// `os-arch`, the form used in manifest URLs and error messages.
    pub fn id(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}
