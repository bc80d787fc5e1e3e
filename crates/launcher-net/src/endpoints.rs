//! Publisher service URLs.

use launcher_types::{Channel, Platform};

/// Base URLs for the two publisher services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Version manifests and the news feed.
    pub launcher_base: String,
    /// Authenticated account data and patch downloads.
    pub account_data_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            launcher_base: "https://launcher.hytale.com".to_string(),
            account_data_base: "https://account-data.hytale.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Component manifest: `{launcher_base}/version/{platform}/{component}.json`.
    pub fn component_manifest(&self, platform: &Platform, component: &str) -> String {
        format!(
            "{}/version/{}/{}.json",
            self.launcher_base,
            platform.id(),
            component
        )
    }

    /// News feed: `{launcher_base}/launcher-feed/{release}/feed.json`.
    pub fn feed(&self, release: &str) -> String {
        format!("{}/{}", self.feed_base(release), "feed.json")
    }

    /// Base the feed's relative URLs resolve against.
    pub fn feed_base(&self, release: &str) -> String {
        format!("{}/launcher-feed/{}", self.launcher_base, release)
    }

    /// Authenticated patchline info: `{account_data_base}/launcher-data`.
    pub fn launcher_data(&self) -> String {
        format!("{}/launcher-data", self.account_data_base)
    }

    /// Patch bytes: `{account_data_base}/patches/{os}/{arch}/{channel}/{build}`.
    pub fn patch(&self, platform: &Platform, channel: Channel, build: u64) -> String {
        format!(
            "{}/patches/{}/{}/{}/{}",
            self.account_data_base, platform.os, platform.arch, channel, build
        )
    }

    /// OAuth token endpoint used by refresh-on-use.
    pub fn token(&self) -> String {
        format!("{}/oauth/token", self.account_data_base)
    }
}
