//! Update planning.
//!
//! Asks each package whether an update is needed and produces an ordered
//! plan. The packages form a closed set handled exhaustively: the launcher
//! compares against its version manifest (no auth), the Java runtime
//! against the per-channel Java manifest, and the game against the
//! authenticated patchline info, where a missing `patchline:<channel>`
//! entitlement means "nothing to do", never an error.

use tracing::{debug, warn};

use launcher_net::{AuthController, Endpoints, Fetcher};
use launcher_store::AppState;
use launcher_types::{BuildInfo, PackageId, Platform, UpdateItem};

use crate::error::UpdateError;
use crate::manifest::ManifestCache;

/// An ordered set of pending updates.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    /// Pending items in execution order.
    pub items: Vec<UpdateItem>,
    /// Packages whose check failed, with the failure text. The plan is
    /// still usable for the packages that answered.
    pub check_errors: Vec<(PackageId, String)>,
}

impl UpdatePlan {
    /// Whether nothing needs updating.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any pending update blocks play.
    pub fn has_blocking(&self) -> bool {
        self.items.iter().any(|item| item.is_blocking)
    }

    /// The pending item for `package`, if any.
    pub fn item(&self, package: PackageId) -> Option<&UpdateItem> {
        self.items.iter().find(|item| item.name == package)
    }
}

/// Produces update plans from the current state and manifests.
pub struct Planner<'a> {
    /// HTTP client.
    pub fetcher: &'a Fetcher,
    /// Service URLs.
    pub endpoints: &'a Endpoints,
    /// Manifest caches.
    pub manifests: &'a ManifestCache,
    /// Auth controller for the game check.
    pub auth: &'a AuthController,
    /// Running launcher identity.
    pub build: BuildInfo,
}

impl<'a> Planner<'a> {
    /// Check every package against `state` and produce a plan.
    ///
    /// Individual check failures are recorded in the plan rather than
    /// failing the whole pass, so one unreachable manifest does not stop
    /// the other packages from updating.
    pub async fn check_for_updates(&self, state: &AppState) -> UpdatePlan {
        let mut plan = UpdatePlan::default();
        let platform = Platform::current();

        for package in PackageId::ORDERED {
            debug!(package = %package, channel = %state.channel, "checking for update");

            let checked = match package {
                PackageId::Launcher => self.check_launcher(&platform).await,
                PackageId::Jre => self.check_jre(&platform, state).await,
                PackageId::Game => self.check_game(state).await,
            };

            match checked {
                Ok(Some(item)) => plan.items.push(item),
                Ok(None) => {}
                Err(err) => {
                    warn!(package = %package, error = %err, "error checking for update");
                    plan.check_errors.push((package, err.to_string()));
                }
            }
        }

        plan
    }

    async fn check_launcher(
        &self,
        platform: &Platform,
    ) -> Result<Option<UpdateItem>, UpdateError> {
        let manifest = self
            .manifests
            .launcher(self.fetcher, self.endpoints, platform)
            .await?;

        if manifest.version == self.build.version {
            return Ok(None);
        }

        Ok(Some(UpdateItem {
            name: PackageId::Launcher,
            version: manifest.version,
            current_version: self.build.version.to_string(),
            is_blocking: manifest.blocking,
            size: manifest.size,
            description: manifest.description,
        }))
    }

    async fn check_jre(
        &self,
        platform: &Platform,
        state: &AppState,
    ) -> Result<Option<UpdateItem>, UpdateError> {
        let manifest = self
            .manifests
            .java(self.fetcher, self.endpoints, platform)
            .await?;

        let Some(entry) = manifest.channel(state.channel) else {
            debug!(channel = %state.channel, "no jre published for channel");
            return Ok(None);
        };

        let current = state.package_dependency(PackageId::Jre);
        if current.is_some_and(|dep| dep.version == entry.version) {
            return Ok(None);
        }

        Ok(Some(UpdateItem {
            name: PackageId::Jre,
            version: entry.version.clone(),
            current_version: current.map(|dep| dep.version.clone()).unwrap_or_default(),
            is_blocking: false,
            size: entry.size,
            description: entry.description.clone(),
        }))
    }

    async fn check_game(&self, state: &AppState) -> Result<Option<UpdateItem>, UpdateError> {
        if !self.auth.is_logged_in().await {
            debug!("not logged in, skipping game update check");
            return Ok(None);
        }

        // Entitlement gate: no patchline access is a quiet no-action.
        let entitled = self
            .auth
            .account()
            .and_then(|account| {
                account
                    .current_profile()
                    .map(|profile| profile.has_patchline(state.channel))
            })
            .unwrap_or(false);
        if !entitled {
            debug!(channel = %state.channel, "profile lacks patchline entitlement");
            return Ok(None);
        }

        let data = self
            .manifests
            .launcher_data(self.fetcher, self.auth, self.endpoints)
            .await?;

        // Keep the account's patchline snapshot current for the UI.
        let patchlines = data.patchlines.clone();
        self.auth.update_account("patchlines_fetched", move |account| {
            account.patchlines = patchlines;
        });

        let Some(patchline) = data.patchlines.get(state.channel.as_str()) else {
            debug!(channel = %state.channel, "no patchline info for channel");
            return Ok(None);
        };

        let current = state.package_dependency(PackageId::Game);
        let current_build = current.map(|dep| dep.build_id).unwrap_or(0);
        if patchline.newest_build <= current_build {
            return Ok(None);
        }

        Ok(Some(UpdateItem {
            name: PackageId::Game,
            version: patchline.newest_build.to_string(),
            current_version: current.map(|dep| dep.version.clone()).unwrap_or_default(),
            is_blocking: false,
            size: 0,
            description: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher_store::{Account, BlobStore, Keyring, MemorySecretStore, Paths, Profile, Token};
    use launcher_net::NetworkMode;
    use launcher_types::Channel;
    use std::sync::Arc;
    use uuid::Uuid;

    fn fetcher() -> Fetcher {
        let build = build_info();
        Fetcher::new(build, Arc::new(NetworkMode::new(build))).unwrap()
    }

    fn build_info() -> BuildInfo {
        BuildInfo {
            release: "release",
            version: "1.0",
        }
    }

    fn auth_fixture(dir: &tempfile::TempDir) -> AuthController {
        let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
        AuthController::new(
            Arc::new(BlobStore::new(Arc::new(keyring), false)),
            Paths::with_root(dir.path()),
            reqwest::Client::new(),
            "http://127.0.0.1:1/oauth/token".to_string(),
        )
    }

    fn logged_in_account(entitlements: &[&str]) -> Account {
        let profile = Profile {
            uuid: Uuid::new_v4(),
            username: "kweebec".to_string(),
            token: Token {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            },
            entitlements: entitlements.iter().map(|s| s.to_string()).collect(),
        };
        let uuid = profile.uuid;
        let mut account = Account {
            profiles: vec![profile],
            ..Account::default()
        };
        account.select_profile(uuid);
        account
    }

    async fn serve_all(platform_id: &str, launcher_version: &str, newest_build: u64) -> Endpoints {
        use axum::routing::get;
        let launcher_version = launcher_version.to_string();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let launcher_path = format!("/version/{platform_id}/launcher.json");
        let jre_path = format!("/version/{platform_id}/jre.json");
        tokio::spawn(async move {
            let router = axum::Router::new()
                .route(
                    &launcher_path,
                    get(move || {
                        let version = launcher_version.clone();
                        async move {
                            axum::Json(serde_json::json!({
                                "version": version,
                                "url": "https://dist/launcher.zip",
                                "blocking": true,
                            }))
                        }
                    }),
                )
                .route(
                    &jre_path,
                    get(|| async {
                        axum::Json(serde_json::json!({
                            "channels": {
                                "release": {"version": "17.0.9", "url": "https://dist/jre.tar.gz"}
                            }
                        }))
                    }),
                )
                .route(
                    "/launcher-data",
                    get(move || async move {
                        axum::Json(serde_json::json!({
                            "patchlines": {
                                "release": {"newest_build": newest_build, "flags": []}
                            }
                        }))
                    }),
                );
            axum::serve(listener, router).await.unwrap();
        });
        Endpoints {
            launcher_base: format!("http://{addr}"),
            account_data_base: format!("http://{addr}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_install_plans_all_three() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_all(&Platform::current().id(), "2.0", 42).await;
        let manifests = ManifestCache::new();
        let auth = auth_fixture(&dir);
        auth.set_account(logged_in_account(&["patchline:release"])).await;

        let fetcher = fetcher();
        let planner = Planner {
            fetcher: &fetcher,
            endpoints: &endpoints,
            manifests: &manifests,
            auth: &auth,
            build: build_info(),
        };

        let state = AppState::new(Channel::Release);
        let plan = planner.check_for_updates(&state).await;

        assert!(plan.check_errors.is_empty());
        let names: Vec<PackageId> = plan.items.iter().map(|i| i.name).collect();
        assert_eq!(names, vec![PackageId::Launcher, PackageId::Jre, PackageId::Game]);
        assert!(plan.has_blocking());
        assert_eq!(plan.item(PackageId::Game).unwrap().version, "42");
    }

    #[tokio::test]
    async fn test_up_to_date_plans_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_all(&Platform::current().id(), "1.0", 42).await;
        let manifests = ManifestCache::new();
        let auth = auth_fixture(&dir);
        auth.set_account(logged_in_account(&["patchline:release"])).await;

        let fetcher = fetcher();
        let planner = Planner {
            fetcher: &fetcher,
            endpoints: &endpoints,
            manifests: &manifests,
            auth: &auth,
            build: build_info(),
        };

        let mut state = AppState::new(Channel::Release);
        state.set_dependency(
            "jre",
            "t",
            Some(launcher_store::Dependency {
                name: "jre".to_string(),
                version: "17.0.9".to_string(),
                build_id: 1,
                path: dir.path().join("release/package/jre/17.0.9"),
            }),
        );
        state.set_dependency(
            "game",
            "t",
            Some(launcher_store::Dependency {
                name: "game".to_string(),
                version: "42".to_string(),
                build_id: 42,
                path: dir.path().join("release/package/game/42"),
            }),
        );

        let plan = planner.check_for_updates(&state).await;
        assert!(plan.is_empty());
        assert!(plan.check_errors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_entitlement_is_quiet_no_action() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_all(&Platform::current().id(), "1.0", 42).await;
        let manifests = ManifestCache::new();
        let auth = auth_fixture(&dir);
        auth.set_account(logged_in_account(&["patchline:beta"])).await;

        let fetcher = fetcher();
        let planner = Planner {
            fetcher: &fetcher,
            endpoints: &endpoints,
            manifests: &manifests,
            auth: &auth,
            build: build_info(),
        };

        let state = AppState::new(Channel::Release);
        let plan = planner.check_for_updates(&state).await;

        assert!(plan.item(PackageId::Game).is_none());
        assert!(plan.check_errors.is_empty());
    }

    #[tokio::test]
    async fn test_logged_out_skips_game_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_all(&Platform::current().id(), "1.0", 42).await;
        let manifests = ManifestCache::new();
        let auth = auth_fixture(&dir);

        let fetcher = fetcher();
        let planner = Planner {
            fetcher: &fetcher,
            endpoints: &endpoints,
            manifests: &manifests,
            auth: &auth,
            build: build_info(),
        };

        let state = AppState::new(Channel::Release);
        let plan = planner.check_for_updates(&state).await;
        assert!(plan.item(PackageId::Game).is_none());
        assert!(plan.check_errors.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_manifests_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = Endpoints {
            launcher_base: "http://127.0.0.1:1".to_string(),
            account_data_base: "http://127.0.0.1:1".to_string(),
        };
        let manifests = ManifestCache::new();
        let auth = auth_fixture(&dir);

        let fetcher = fetcher();
        let planner = Planner {
            fetcher: &fetcher,
            endpoints: &endpoints,
            manifests: &manifests,
            auth: &auth,
            build: build_info(),
        };

        let state = AppState::new(Channel::Release);
        let plan = planner.check_for_updates(&state).await;
        assert!(plan.is_empty());
        // Launcher and jre checks both failed; game was quietly skipped.
        assert_eq!(plan.check_errors.len(), 2);
    }
}
