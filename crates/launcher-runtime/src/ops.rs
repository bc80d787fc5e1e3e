//! Operations façade.
//!
//! The methods the UI bridge calls, implemented on [`Core`]. Updates
//! forward to the executor, launches to the launch coordinator, account
//! operations to the auth controller. Long operations emit their progress
//! through the event bus.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use launcher_bus::ProgressGate;
use launcher_launch::{ClientLaunch, GameSession, LaunchAuth, LaunchError, ServerLaunch};
use launcher_net::{Article, NetMode};
use launcher_store::{AppState, PlayerProfiles, LKG_DEP};
use launcher_types::{Channel, PackageId, Platform, UpdateEvent, UpdateItem};
use launcher_update::planner::Planner;
use launcher_update::scan::{self, GameInstall};
use launcher_update::sig::Signature;
use launcher_update::{executor, repair};

use crate::core::Core;
use crate::error::LauncherError;

/// Fallback offline player name when none was stored.
const DEFAULT_PLAYER_NAME: &str = "Player";

/// Java executable name inside a JRE install.
#[cfg(windows)]
const JAVA_EXECUTABLE: &str = "bin/java.exe";
#[cfg(not(windows))]
const JAVA_EXECUTABLE: &str = "bin/java";

/// Server jar location inside a game install.
const SERVER_JAR: &str = "Server/hytale-server.jar";

/// Assets archive passed to the server, relative to its working dir.
const SERVER_ASSETS: &str = "Assets.zip";

impl Core {
    // ----- channel state -----

    /// Load (or create) the state for `channel` and make it current.
    ///
    /// A platform mismatch or corrupt state file surfaces as an error; the
    /// UI resolves it with [`Core::reset_channel`].
    pub async fn select_channel(&self, channel: Channel) -> Result<(), LauncherError> {
        let state = match AppState::load(&self.store, &self.paths, channel) {
            Ok(state) => state,
            Err(err) if err.is_not_found() => AppState::new(channel),
            Err(err) => return Err(err.into()),
        };

        // Repair anything a crashed swap left behind before trusting paths.
        executor::restore_channel_installs(&state)?;

        info!(channel = %channel, is_new = state.is_new, "channel selected");
        *self.state.write().await = Some(state);
        Ok(())
    }

    /// Discard the on-disk state for `channel` and start fresh.
    ///
    /// Used after an integrity failure; prior dependencies are forgotten
    /// and the new state records the current platform.
    pub async fn reset_channel(&self, channel: Channel) -> Result<(), LauncherError> {
        warn!(channel = %channel, "resetting channel state");
        AppState::remove_file(&self.store, &self.paths, channel)?;

        let mut state = AppState::new(channel);
        state.save(&self.store, &self.paths, "reset");
        *self.state.write().await = Some(state);
        Ok(())
    }

    /// The currently selected channel, if any.
    pub async fn current_channel(&self) -> Option<Channel> {
        self.state.read().await.as_ref().map(|s| s.channel)
    }

    /// Installed game version for the selected channel.
    pub async fn game_version(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .and_then(|s| s.package_dependency(PackageId::Game).map(|d| d.version.clone()))
    }

    /// Whether game and runtime are installed and launchable.
    pub async fn is_game_available(&self) -> bool {
        self.state
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.has_offline_dependencies())
    }

    // ----- updates -----

    /// Check every package for updates and remember the plan.
    pub async fn check_for_updates(&self) -> Result<Vec<UpdateItem>, LauncherError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(LauncherError::NoChannel)?;

        let planner = Planner {
            fetcher: &self.fetcher,
            endpoints: &self.endpoints,
            manifests: &self.manifests,
            auth: &self.auth,
            build: self.build,
        };
        let plan = planner.check_for_updates(state).await;
        drop(guard);

        for (package, error) in &plan.check_errors {
            self.bus.emit_event(UpdateEvent::error(*package, error));
        }

        let items = plan.items.clone();
        *self.plan.lock() = plan;
        Ok(items)
    }

    /// Pending updates from the last check.
    pub fn pending_updates(&self) -> Vec<UpdateItem> {
        self.plan.lock().items.clone()
    }

    /// Whether any pending update blocks play.
    pub fn has_blocking_updates(&self) -> bool {
        self.plan.lock().has_blocking()
    }

    /// Apply the pending plan.
    ///
    /// Only one apply task may run at a time. On success `update:complete`
    /// is emitted; a cancelled run emits `update:cancelled`; failures have
    /// already emitted their `error` event from the executor.
    pub async fn apply_updates(&self) -> Result<(), LauncherError> {
        if !self.mark_updating() {
            warn!("update already in progress");
            return Err(LauncherError::AlreadyUpdating);
        }

        let result = self.apply_updates_inner().await;

        self.clear_updating();
        *self.update_cancel.lock() = None;

        match result {
            Ok(()) => {
                info!("updates applied");
                self.bus.emit_named("update:complete");
                Ok(())
            }
            Err(err) if err.is_cancelled() => {
                info!("update cancelled");
                self.bus.emit_named("update:cancelled");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn apply_updates_inner(&self) -> Result<(), LauncherError> {
        let cancel = CancellationToken::new();
        *self.update_cancel.lock() = Some(cancel.clone());

        let plan = self.plan.lock().clone();
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(LauncherError::NoChannel)?;

        self.executor.apply_updates(state, &plan, &cancel).await?;
        self.plan.lock().items.clear();
        Ok(())
    }

    /// Cancel the in-flight update task, if any.
    pub fn cancel_updates(&self) {
        info!("cancelling updates");
        if let Some(cancel) = self.update_cancel.lock().as_ref() {
            cancel.cancel();
        }
    }

    /// Lightweight "is a launcher update available" check.
    pub async fn has_freestanding_launcher_update(&self) -> Result<bool, LauncherError> {
        let manifest = self
            .manifests
            .launcher(&self.fetcher, &self.endpoints, &Platform::current())
            .await?;
        Ok(manifest.version != self.build.version)
    }

    /// Invalidate manifest caches and emit `settings:reset`.
    pub fn reset_settings(&self) {
        info!("resetting settings");
        self.manifests.invalidate_all();
        self.news.clear();
        self.bus.emit_named("settings:reset");
    }

    // ----- validation -----

    /// Verify the installed game tree against its signature.
    ///
    /// Emits `validate:progress` per file and `validate:success` or
    /// `validate:failed` at the end.
    pub async fn validate_game_files(&self) -> Result<bool, LauncherError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(LauncherError::NoChannel)?;
        let dep = state
            .package_dependency(PackageId::Game)
            .ok_or(LauncherError::Launch(LaunchError::GameNotInstalled))?;

        let signature = Signature::read_file(&dep.sig_path())?;
        let bus = Arc::clone(&self.bus);
        let gate = parking_lot::Mutex::new(ProgressGate::new());

        let report = repair::verify_tree(
            &dep.path,
            &signature.files,
            Some(&move |current, total, path| {
                let fraction = current as f64 / total.max(1) as f64;
                if gate.lock().allow(fraction) {
                    bus.emit(
                        "validate:progress",
                        serde_json::json!({
                            "current": current,
                            "total": total,
                            "progress": fraction,
                            "path": path,
                        }),
                    );
                }
            }),
        );

        if report.is_healthy() {
            self.bus.emit_named("validate:success");
            Ok(true)
        } else {
            self.bus.emit(
                "validate:failed",
                serde_json::json!({
                    "missing": report.missing.len(),
                    "corrupted": report.corrupted.len(),
                }),
            );
            Ok(false)
        }
    }

    // ----- launch -----

    /// The auth mode launches will use.
    pub fn launch_auth_mode(&self) -> &'static str {
        match self.mode.current() {
            NetMode::Online => "online",
            NetMode::Offline => "offline",
        }
    }

    /// Install the game session obtained by the UI's auth flow.
    pub fn set_game_session(&self, session: GameSession) {
        *self.session.lock() = session;
    }

    /// Whether a valid game session is held.
    pub fn has_valid_session(&self) -> bool {
        self.session.lock().is_valid()
    }

    /// Launch the game client for the selected channel.
    pub async fn launch_game(&self) -> Result<(), LauncherError> {
        let online = self.mode.current() == NetMode::Online;

        // Online launches need a live session before anything else is
        // consulted, so the UI can route straight to login.
        if online && !self.has_valid_session() {
            return Err(LauncherError::Launch(LaunchError::Auth(
                "online launch requires a valid session".to_string(),
            )));
        }

        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(|| {
            if online {
                LauncherError::NoChannel
            } else {
                // Offline with nothing installed: surfaced as an auth
                // error so the UI lands on "game unavailable".
                LauncherError::Launch(LaunchError::Auth(
                    "offline launch requires an installed channel".to_string(),
                ))
            }
        })?;

        if self.has_blocking_updates() {
            return Err(LauncherError::BlockingUpdatePending);
        }

        let game = state
            .package_dependency(PackageId::Game)
            .ok_or(LauncherError::Launch(LaunchError::GameNotInstalled))?;
        let jre = state
            .package_dependency(PackageId::Jre)
            .ok_or(LauncherError::Launch(LaunchError::JavaNotInstalled))?;

        let auth = if online {
            let session = self.session.lock().clone();
            let account = self
                .auth
                .account()
                .ok_or_else(|| LauncherError::Launch(LaunchError::Auth("not logged in".to_string())))?;
            let profile = account.current_profile().ok_or_else(|| {
                LauncherError::Launch(LaunchError::Auth("no active profile".to_string()))
            })?;
            LaunchAuth::Online {
                uuid: profile.uuid,
                name: profile.username.clone(),
                session_token: session.session_token,
                identity_token: session.identity_token,
                profile_id: profile.uuid.to_string(),
            }
        } else {
            let mut profiles = PlayerProfiles::load(&self.paths)?;
            let name = profiles
                .last_player_name()?
                .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string());
            let profile = profiles.get_or_create(&name)?;
            LaunchAuth::Offline {
                uuid: profile.uuid,
                name,
            }
        };

        let launch = ClientLaunch {
            app_dir: game.path.clone(),
            user_dir: self.paths.channel_dir(state.channel).join("user"),
            java_exec: jre.path.join(JAVA_EXECUTABLE),
            auth,
            extra_args: Vec::new(),
        };

        let pid = launch.spawn()?;
        info!(pid, channel = %state.channel, "game launched");
        self.bus
            .emit("game:launched", serde_json::json!({ "pid": pid }));
        Ok(())
    }

    /// Start the local server for the selected channel.
    pub async fn start_server(&self) -> Result<(), LauncherError> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(LauncherError::NoChannel)?;
        let game = state
            .package_dependency(PackageId::Game)
            .ok_or(LauncherError::Launch(LaunchError::GameNotInstalled))?;
        let jre = state
            .package_dependency(PackageId::Jre)
            .ok_or(LauncherError::Launch(LaunchError::JavaNotInstalled))?;

        let launch = ServerLaunch::java(
            jre.path.join(JAVA_EXECUTABLE),
            game.path.join(SERVER_JAR),
            SERVER_ASSETS,
            game.path.clone(),
        );
        self.server.start(launch).await?;
        Ok(())
    }

    /// Stop the supervised server.
    pub fn stop_server(&self) -> Result<(), LauncherError> {
        self.server.stop()?;
        Ok(())
    }

    // ----- offline player -----

    /// The stored offline player name.
    pub fn offline_player_name(&self) -> Result<Option<String>, LauncherError> {
        Ok(PlayerProfiles::load(&self.paths)?.last_player_name()?)
    }

    /// Remember the offline player name and materialize its profile.
    pub fn set_offline_player_name(&self, name: &str) -> Result<(), LauncherError> {
        let mut profiles = PlayerProfiles::load(&self.paths)?;
        profiles.get_or_create(name)?;
        profiles.set_last_player_name(name)?;
        Ok(())
    }

    // ----- eula -----

    /// The embedded EULA text.
    pub fn eula_text(&self) -> &'static str {
        crate::startup::EULA_TEXT
    }

    /// Whether the signed-in account has accepted the EULA.
    pub fn has_accepted_eula(&self) -> bool {
        self.auth
            .account()
            .is_some_and(|account| account.eula_accepted_at.is_some())
    }

    /// Record EULA acceptance, extract the legal files and notify the UI.
    pub fn accept_eula(&self) {
        if self.auth.account().is_none() {
            warn!("cannot accept eula, no user logged in");
            return;
        }

        info!("eula accepted");
        self.auth.update_account("eula_accepted", |account| {
            account.eula_accepted_at = Some(Utc::now());
        });
        crate::startup::write_legal_files(&self.paths);
        self.bus.emit_named("eula_accepted");
    }

    /// Declining the EULA logs the user out.
    pub async fn decline_eula(&self) -> Result<(), LauncherError> {
        info!("eula declined");
        self.auth.logout().await?;
        Ok(())
    }

    // ----- installs, uninstall, deletion -----

    /// All game installs across channels.
    pub fn installed_games(&self) -> Vec<GameInstall> {
        scan::scan_installed_games(&self.store, &self.paths)
    }

    /// Install directory sizes keyed by channel name.
    pub fn installed_game_sizes(&self) -> Vec<(String, u64)> {
        self.installed_games()
            .into_iter()
            .map(|install| (install.channel.to_string(), scan::dir_size(&install.dir)))
            .collect()
    }

    /// Uninstall every game build of `channel`, with progress events.
    pub async fn uninstall_game(&self, channel: Channel) -> Result<(), LauncherError> {
        let mut state = match AppState::load(&self.store, &self.paths, channel) {
            Ok(state) => state,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        for slot in [PackageId::Game.as_str(), LKG_DEP] {
            let Some(dep) = state.dependency(slot).cloned() else {
                continue;
            };
            let install = GameInstall {
                channel,
                slot: slot.to_string(),
                version: dep.version.clone(),
                dir: dep.path.clone(),
                has_signature: dep.sig_path().is_file(),
            };

            let bus = Arc::clone(&self.bus);
            scan::uninstall_game(
                &self.store,
                &self.paths,
                &mut state,
                &install,
                Some(&move |current| {
                    bus.emit("uninstall:progress", serde_json::json!({ "current": current }));
                }),
            )?;
        }

        self.bus.emit_named("uninstall:complete");

        // Keep the in-memory copy coherent when the selected channel was
        // the one uninstalled.
        let mut guard = self.state.write().await;
        if guard.as_ref().is_some_and(|s| s.channel == channel) {
            *guard = Some(state);
        }
        Ok(())
    }

    /// Delete the whole storage directory, with progress events.
    pub async fn delete_user_data(&self) -> Result<(), LauncherError> {
        if self.is_updating() {
            return Err(LauncherError::AlreadyUpdating);
        }

        warn!("deleting all user data");
        if let Err(err) = self.auth.logout().await {
            warn!(error = %err, "logout before data deletion failed");
        }

        let storage = self.paths.storage_dir().to_path_buf();
        if storage.exists() {
            let bus = Arc::clone(&self.bus);
            scan::delete_dir_with_progress(
                &storage,
                Some(&move |current| {
                    bus.emit("delete:progress", serde_json::json!({ "current": current }));
                }),
            )?;
        }

        *self.state.write().await = None;
        self.bus.emit_named("delete:complete");
        Ok(())
    }

    // ----- news -----

    /// Fetch (or serve cached) news articles.
    pub async fn news_articles(&self, force_refresh: bool) -> Result<(bool, Vec<Article>), LauncherError> {
        let release = self.build.release;
        Ok(self
            .news
            .articles(&self.fetcher, &self.endpoints, release, force_refresh)
            .await?)
    }
}
