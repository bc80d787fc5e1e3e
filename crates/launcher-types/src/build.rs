//! Build identity.
//!
//! Release branch and version are stamped at build time through
//! environment variables (the CI pipeline sets them; local builds fall
//! back to a `dev` identity). Several behaviors key off the dev branch:
//! the blob store writes plaintext, the `.json` state fallback is honored,
//! and the offline-mode override variable is recognized.

/// Release branch and version of the running launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Release branch, e.g. `release` or `dev`.
    pub release: &'static str,
    /// Version string, e.g. `2026-07-12-9c1e4b2`.
    pub version: &'static str,
}

/// Branch name of development builds.
const DEV_RELEASE: &str = "dev";

impl BuildInfo {
    /// The identity stamped into this binary.
    pub fn current() -> BuildInfo {
        BuildInfo {
            release: option_env!("HYTALE_LAUNCHER_RELEASE").unwrap_or(DEV_RELEASE),
            version: option_env!("HYTALE_LAUNCHER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")),
        }
    }

    /// Whether this is a development build.
    pub fn is_dev(&self) -> bool {
        self.release == DEV_RELEASE
    }

    /// User-agent for outbound requests.
    ///
    /// Release builds identify as `hytale-launcher/{version}`; every other
    /// branch includes the branch name as well.
    pub fn user_agent(&self) -> String {
        if self.release == "release" {
            format!("hytale-launcher/{}", self.version)
        } else {
            format!("hytale-launcher/{}/{}", self.release, self.version)
        }
    }
}
