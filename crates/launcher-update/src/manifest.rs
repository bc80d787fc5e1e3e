//! Version manifests.
//!
//! Component manifests come from the launcher service per platform; the
//! authenticated `launcher-data` document carries per-patchline build
//! numbers. All three are cached in memory until explicitly invalidated
//! (the settings "check for updates" action, and other demand points).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use launcher_bus::CachedState;
use launcher_net::{AuthController, Endpoints, Fetcher};
use launcher_store::PatchlineInfo;
use launcher_types::{Channel, Platform};

use crate::error::UpdateError;

/// A downloadable component version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentManifest {
    /// Version string of the published build.
    pub version: String,
    /// Archive URL.
    pub url: String,
    /// Archive SHA-256, empty when the publisher does not provide one.
    #[serde(default)]
    pub sha256: String,
    /// Archive size in bytes, zero when unknown.
    #[serde(default)]
    pub size: u64,
    /// Whether this update blocks play until applied.
    #[serde(default)]
    pub blocking: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// The Java manifest: one component entry per channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JavaManifest {
    /// Channel name → component entry.
    #[serde(default)]
    pub channels: HashMap<String, ComponentManifest>,
}

impl JavaManifest {
    /// The entry for `channel`, if published.
    pub fn channel(&self, channel: Channel) -> Option<&ComponentManifest> {
        self.channels.get(channel.as_str())
    }
}

/// The authenticated patchline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LauncherData {
    /// Patchline name → info.
    #[serde(default)]
    pub patchlines: HashMap<String, PatchlineInfo>,
}

/// In-memory manifest caches with explicit invalidation.
pub struct ManifestCache {
    launcher: CachedState<ComponentManifest>,
    java: CachedState<JavaManifest>,
    launcher_data: CachedState<LauncherData>,
}

impl ManifestCache {
    /// Empty caches.
    pub fn new() -> ManifestCache {
        ManifestCache {
            launcher: CachedState::new(),
            java: CachedState::new(),
            launcher_data: CachedState::new(),
        }
    }

    /// Drop every cached manifest, forcing re-fetch on next access.
    pub fn invalidate_all(&self) {
        debug!("invalidating cached version manifests");
        self.launcher.invalidate();
        self.java.invalidate();
        self.launcher_data.invalidate();
    }

    /// The launcher component manifest, fetched on first access.
    pub async fn launcher(
        &self,
        fetcher: &Fetcher,
        endpoints: &Endpoints,
        platform: &Platform,
    ) -> Result<ComponentManifest, UpdateError> {
        if let Some(cached) = self.launcher.get() {
            return Ok(cached);
        }

        let url = endpoints.component_manifest(platform, "launcher");
        match fetcher.get_json::<ComponentManifest>(&url, &[]).await {
            Ok(manifest) => {
                self.launcher.set(manifest.clone());
                Ok(manifest)
            }
            Err(err) => {
                self.launcher.set_error(&err);
                Err(err.into())
            }
        }
    }

    /// The Java manifest, fetched on first access.
    pub async fn java(
        &self,
        fetcher: &Fetcher,
        endpoints: &Endpoints,
        platform: &Platform,
    ) -> Result<JavaManifest, UpdateError> {
        if let Some(cached) = self.java.get() {
            return Ok(cached);
        }

        let url = endpoints.component_manifest(platform, "jre");
        match fetcher.get_json::<JavaManifest>(&url, &[]).await {
            Ok(manifest) => {
                self.java.set(manifest.clone());
                Ok(manifest)
            }
            Err(err) => {
                self.java.set_error(&err);
                Err(err.into())
            }
        }
    }

    /// The authenticated patchline document, fetched on first access.
    pub async fn launcher_data(
        &self,
        fetcher: &Fetcher,
        auth: &AuthController,
        endpoints: &Endpoints,
    ) -> Result<LauncherData, UpdateError> {
        if let Some(cached) = self.launcher_data.get() {
            return Ok(cached);
        }

        let token = auth.access_token().await?;
        let url = endpoints.launcher_data();
        match fetcher
            .get_json_with_bearer::<LauncherData>(&url, &token)
            .await
        {
            Ok(data) => {
                self.launcher_data.set(data.clone());
                Ok(data)
            }
            Err(err) => {
                self.launcher_data.set_error(&err);
                Err(err.into())
            }
        }
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new()
    }
}
