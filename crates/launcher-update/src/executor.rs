//! Plan execution.
//!
//! Runs an update plan strictly in package order: `launcher` → `jre` →
//! `game`. Each step downloads its payload into the cache directory,
//! verifies it, applies it (extraction for launcher and jre, a staged
//! patch with LKG demotion for the game), records the dependency, saves
//! the state and emits its `complete` event, in that order.
//!
//! A failed step stops the plan and emits an `error` event; cancellation
//! propagates out without an error event so the UI can emit
//! `update:cancelled` itself. Progress is aggregated across steps into a
//! single `[0, 1]` fraction, weighted by payload size when sizes are
//! known, and throttled through one progress gate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use launcher_bus::{EventBus, ProgressGate};
use launcher_net::{DownloadProgress, Endpoints, Fetcher};
use launcher_store::{AppState, BlobStore, Dependency, Paths, LKG_DEP};
use launcher_types::{
    BuildInfo, PackageId, Platform, UpdateEvent, UpdateItem, UpdateNotification,
};

use crate::error::UpdateError;
use crate::extract;
use crate::manifest::{ComponentManifest, ManifestCache};
use crate::planner::UpdatePlan;
use crate::repair;
use crate::selfupdate::{self, CleanupNote};
use crate::wharf;

/// Share of each step's slice spent downloading; the rest is apply time.
const DOWNLOAD_SHARE: f64 = 0.8;

/// Executes update plans.
pub struct UpdateExecutor {
    fetcher: Arc<Fetcher>,
    endpoints: Endpoints,
    manifests: Arc<ManifestCache>,
    bus: Arc<EventBus>,
    store: Arc<BlobStore>,
    paths: Paths,
    build: BuildInfo,
    gate: Arc<Mutex<ProgressGate>>,
}

/// Pre-attempt dependency records restored on a failed game step.
struct GameSnapshot {
    game: Option<Dependency>,
    lkg: Option<Dependency>,
}

impl UpdateExecutor {
    /// An executor over the shared subsystems.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<Fetcher>,
        endpoints: Endpoints,
        manifests: Arc<ManifestCache>,
        bus: Arc<EventBus>,
        store: Arc<BlobStore>,
        paths: Paths,
        build: BuildInfo,
    ) -> UpdateExecutor {
        UpdateExecutor {
            fetcher,
            endpoints,
            manifests,
            bus,
            store,
            paths,
            build,
            gate: Arc::new(Mutex::new(ProgressGate::new())),
        }
    }

    /// Run `plan` against `state`.
    ///
    /// Steps run serially in the fixed package order. The first failure
    /// aborts the remaining steps; cancellation returns `Cancelled`
    /// without emitting an `error` event.
    pub async fn apply_updates(
        &self,
        state: &mut AppState,
        plan: &UpdatePlan,
        cancel: &CancellationToken,
    ) -> Result<(), UpdateError> {
        *self.gate.lock() = ProgressGate::new();
        let weights = step_weights(&plan.items);
        let mut offset = 0.0;

        for (item, weight) in plan.items.iter().zip(weights) {
            if cancel.is_cancelled() {
                return Err(UpdateError::Cancelled);
            }

            info!(package = %item.name, version = %item.version, "applying update");
            let result = self.apply_step(state, item, cancel, offset, weight).await;

            if let Err(err) = result {
                if err.is_cancelled() {
                    info!(package = %item.name, "update step cancelled");
                    return Err(UpdateError::Cancelled);
                }
                warn!(package = %item.name, error = %err, "failed to apply update");
                self.bus.emit_event(UpdateEvent::error(item.name, &err));
                return Err(err);
            }

            offset += weight;
        }

        Ok(())
    }

    async fn apply_step(
        &self,
        state: &mut AppState,
        item: &UpdateItem,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<(), UpdateError> {
        self.bus
            .emit_event(UpdateEvent::package("checking", item.name));

        match item.name {
            PackageId::Launcher => self.apply_launcher(state, item, cancel, offset, weight).await,
            PackageId::Jre => self.apply_jre(state, item, cancel, offset, weight).await,
            PackageId::Game => self.apply_game(state, item, cancel, offset, weight).await,
        }
    }

    async fn apply_launcher(
        &self,
        state: &mut AppState,
        item: &UpdateItem,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<(), UpdateError> {
        let platform = Platform::current();
        let manifest = self
            .manifests
            .launcher(&self.fetcher, &self.endpoints, &platform)
            .await?;

        self.emit_applying(item);
        let payload = self
            .download_payload(item.name, &manifest, cancel, offset, weight)
            .await?;

        let dest = self
            .paths
            .package_dir(PackageId::Launcher, state.channel, &manifest.version);
        let previous = state.package_dependency(PackageId::Launcher).cloned();

        // Upgrading over a live install: keep logs and scratch files.
        self.run_extraction(item.name, &payload, &dest, false, offset, weight)
            .await?;
        std::fs::remove_file(&payload).ok();

        // Leave a note so the restarted launcher removes the old install.
        if let Some(previous) = &previous {
            if previous.version != manifest.version {
                selfupdate::write_note(
                    &self.store,
                    &self.paths,
                    &CleanupNote {
                        channel: state.channel,
                        version: previous.version.clone(),
                    },
                )?;
            }
        }

        let build_id = previous.map(|dep| dep.build_id + 1).unwrap_or(1);
        state.set_dependency(
            PackageId::Launcher.as_str(),
            "update",
            Some(Dependency {
                name: PackageId::Launcher.as_str().to_string(),
                version: manifest.version.clone(),
                build_id,
                path: dest,
            }),
        );
        state.save(&self.store, &self.paths, "applied_launcher");

        self.emit_complete(item);
        Ok(())
    }

    async fn apply_jre(
        &self,
        state: &mut AppState,
        item: &UpdateItem,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<(), UpdateError> {
        let platform = Platform::current();
        let manifest = self
            .manifests
            .java(&self.fetcher, &self.endpoints, &platform)
            .await?;
        let entry = manifest.channel(state.channel).cloned().ok_or_else(|| {
            UpdateError::Fetch(launcher_net::FetchError::Status {
                status: 404,
                url: self.endpoints.component_manifest(&platform, "jre"),
            })
        })?;

        self.emit_applying(item);
        let payload = self
            .download_payload(item.name, &entry, cancel, offset, weight)
            .await?;

        let dest = self
            .paths
            .package_dir(PackageId::Jre, state.channel, &entry.version);
        let previous = state.package_dependency(PackageId::Jre).cloned();

        self.run_extraction(item.name, &payload, &dest, true, offset, weight)
            .await?;
        std::fs::remove_file(&payload).ok();

        let build_id = previous.map(|dep| dep.build_id + 1).unwrap_or(1);
        state.set_dependency(
            PackageId::Jre.as_str(),
            "update",
            Some(Dependency {
                name: PackageId::Jre.as_str().to_string(),
                version: entry.version.clone(),
                build_id,
                path: dest,
            }),
        );
        state.save(&self.store, &self.paths, "applied_jre");

        self.emit_complete(item);
        Ok(())
    }

    async fn apply_game(
        &self,
        state: &mut AppState,
        item: &UpdateItem,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<(), UpdateError> {
        let platform = Platform::current();
        let to_build: u64 = item.version.parse().map_err(|_| {
            UpdateError::invalid_patch(&item.version, "game version is not a build number")
        })?;

        let url = self.endpoints.patch(&platform, state.channel, to_build);
        let progress = self.download_reporter(item.name, offset, weight * DOWNLOAD_SHARE);
        let payload = self
            .fetcher
            .download_temp(
                cancel,
                &self.paths.cache_dir(),
                &url,
                None,
                Some(progress.as_ref()),
            )
            .await?;

        // 404 answered with an empty file: no patch published for this
        // build. The step completes without touching the install.
        if std::fs::metadata(&payload)?.len() == 0 {
            debug!(build = to_build, "no patch for this version");
            std::fs::remove_file(&payload).ok();
            self.emit_complete(item);
            return Ok(());
        }

        self.emit_applying(item);

        let snapshot = GameSnapshot {
            game: state.package_dependency(PackageId::Game).cloned(),
            lkg: state.dependency(LKG_DEP).cloned(),
        };

        // Demote the current install to its numbered build directory and
        // record it as last-known-good before anything is staged.
        self.demote_game(state)?;

        let target = self
            .paths
            .package_dir(PackageId::Game, state.channel, &item.version);
        let sig_path = target
            .parent()
            .map(|parent| parent.join(format!("{}.sig", item.version)))
            .unwrap_or_else(|| PathBuf::from(format!("{}.sig", item.version)));
        let source = state.dependency(LKG_DEP).map(|dep| dep.path.clone());

        let applied = self
            .run_patch(item.name, &payload, source, &target, &sig_path, cancel, offset, weight)
            .await;
        std::fs::remove_file(&payload).ok();

        let manifest = match applied {
            Ok(manifest) => manifest,
            Err(err) => {
                self.rollback_game(state, snapshot, &target);
                return Err(err);
            }
        };

        // Post-check against the freshly written signature; a tree that
        // fails here is rolled back to last-known-good.
        let verified = repair::verify_tree(&target, &manifest.signature.files, None);
        if !verified.is_healthy() {
            warn!(
                target = %target.display(),
                missing = verified.missing.len(),
                corrupted = verified.corrupted.len(),
                "applied game tree failed verification, rolling back"
            );
            let err = UpdateError::VerifyFailed {
                dir: target.clone(),
                missing: verified.missing.len(),
                corrupted: verified.corrupted.len(),
            };
            std::fs::remove_dir_all(&target).ok();
            std::fs::remove_file(&sig_path).ok();
            self.rollback_game(state, snapshot, &target);
            return Err(err);
        }

        state.set_dependency(
            PackageId::Game.as_str(),
            "update",
            Some(Dependency {
                name: PackageId::Game.as_str().to_string(),
                version: item.version.clone(),
                build_id: to_build,
                path: target,
            }),
        );
        state.save(&self.store, &self.paths, "applied_game");

        self.emit_complete(item);
        Ok(())
    }

    /// Rename the current game install aside as last-known-good.
    fn demote_game(&self, state: &mut AppState) -> Result<(), UpdateError> {
        let Some(current) = state.package_dependency(PackageId::Game).cloned() else {
            debug!("no current game install, nothing to demote");
            state.set_dependency(LKG_DEP, "demote", None);
            return Ok(());
        };

        let dest = self.paths.package_dir(
            PackageId::Game,
            state.channel,
            &format!("build-{}", current.build_id),
        );

        info!(
            build = current.build_id,
            from = %current.path.display(),
            to = %dest.display(),
            "demoting current game install to last-known-good"
        );

        if dest != current.path {
            std::fs::remove_dir_all(&dest).or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
            std::fs::rename(&current.path, &dest)?;
        }

        let demoted = Dependency {
            name: LKG_DEP.to_string(),
            version: current.version,
            build_id: current.build_id,
            path: dest,
        };
        state.set_dependency(PackageId::Game.as_str(), "demote", None);
        state.set_dependency(LKG_DEP, "demote", Some(demoted));
        Ok(())
    }

    /// Restore the pre-attempt game layout and records after a failed step.
    fn rollback_game(&self, state: &mut AppState, snapshot: GameSnapshot, target: &Path) {
        std::fs::remove_dir_all(target).ok();

        if let Some(previous) = &snapshot.game {
            // The demoted directory is where the old install lives now.
            if let Some(demoted) = state.dependency(LKG_DEP) {
                if demoted.path != previous.path && demoted.path.exists() {
                    if let Err(err) = std::fs::rename(&demoted.path, &previous.path) {
                        warn!(error = %err, "failed to restore demoted game install");
                    }
                }
            }
        }

        state.set_dependency(PackageId::Game.as_str(), "rollback", snapshot.game);
        state.set_dependency(LKG_DEP, "rollback", snapshot.lkg);
        state.save(&self.store, &self.paths, "rollback_game");
    }

    async fn download_payload(
        &self,
        package: PackageId,
        manifest: &ComponentManifest,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<PathBuf, UpdateError> {
        let sha256 = if manifest.sha256.is_empty() {
            None
        } else {
            Some(manifest.sha256.as_str())
        };
        let progress = self.download_reporter(package, offset, weight * DOWNLOAD_SHARE);

        let path = self
            .fetcher
            .download_temp(
                cancel,
                &self.paths.cache_dir(),
                &manifest.url,
                sha256,
                Some(progress.as_ref()),
            )
            .await?;
        Ok(path)
    }

    async fn run_extraction(
        &self,
        package: PackageId,
        archive: &Path,
        dest: &Path,
        clean_dest: bool,
        offset: f64,
        weight: f64,
    ) -> Result<(), UpdateError> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let reporter = self.fraction_reporter(package, offset + weight * DOWNLOAD_SHARE, weight * (1.0 - DOWNLOAD_SHARE));

        tokio::task::spawn_blocking(move || {
            let progress = move |current: usize, total: usize| {
                if total > 0 {
                    reporter(current as f64 / total as f64);
                }
            };
            if clean_dest {
                extract::extract(&archive, &dest, Some(&progress), Some(&extract::strip_root_dir))
            } else {
                extract::extract_without_cleanup(&archive, &dest, Some(&progress), None)
            }
        })
        .await
        .map_err(|e| UpdateError::Io(std::io::Error::other(e)))?
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_patch(
        &self,
        package: PackageId,
        patch: &Path,
        source: Option<PathBuf>,
        target: &Path,
        sig_path: &Path,
        cancel: &CancellationToken,
        offset: f64,
        weight: f64,
    ) -> Result<wharf::PatchManifest, UpdateError> {
        let patch = patch.to_path_buf();
        let target = target.to_path_buf();
        let sig_path = sig_path.to_path_buf();
        let cancel = cancel.clone();
        let reporter = self.fraction_reporter(package, offset + weight * DOWNLOAD_SHARE, weight * (1.0 - DOWNLOAD_SHARE));

        tokio::task::spawn_blocking(move || {
            wharf::apply_patch(
                &patch,
                source.as_deref(),
                &target,
                &sig_path,
                &cancel,
                Some(&move |fraction| reporter(fraction)),
            )
        })
        .await
        .map_err(|e| UpdateError::Io(std::io::Error::other(e)))?
    }

    /// A download progress callback mapping into `[offset, offset+scale]`.
    fn download_reporter(
        &self,
        package: PackageId,
        offset: f64,
        scale: f64,
    ) -> Arc<dyn Fn(DownloadProgress) + Send + Sync> {
        let bus = Arc::clone(&self.bus);
        let gate = Arc::clone(&self.gate);

        Arc::new(move |progress: DownloadProgress| {
            let fraction = if progress.bytes_total > 0 {
                progress.bytes_downloaded.min(progress.bytes_total) as f64
                    / progress.bytes_total as f64
            } else {
                0.0
            };
            let overall = offset + fraction * scale;

            if gate.lock().allow(overall) {
                bus.notify(UpdateNotification {
                    package: Some(package),
                    progress: overall,
                    bytes_downloaded: progress.bytes_downloaded,
                    bytes_total: progress.bytes_total,
                    speed: progress.speed,
                });
            }
        })
    }

    /// A fraction callback (extraction, patching) mapping into the slice.
    fn fraction_reporter(
        &self,
        package: PackageId,
        offset: f64,
        scale: f64,
    ) -> Arc<dyn Fn(f64) + Send + Sync> {
        let bus = Arc::clone(&self.bus);
        let gate = Arc::clone(&self.gate);

        Arc::new(move |fraction: f64| {
            let overall = offset + fraction.clamp(0.0, 1.0) * scale;
            if gate.lock().allow(overall) {
                bus.notify(UpdateNotification {
                    package: Some(package),
                    progress: overall,
                    ..UpdateNotification::default()
                });
            }
        })
    }

    fn emit_applying(&self, item: &UpdateItem) {
        self.bus.emit_event(UpdateEvent {
            name: "applying".to_string(),
            package: Some(item.name),
            version: Some(item.version.clone()),
            error: None,
        });
    }

    fn emit_complete(&self, item: &UpdateItem) {
        self.bus.emit_event(UpdateEvent {
            name: "complete".to_string(),
            package: Some(item.name),
            version: Some(item.version.clone()),
            error: None,
        });
    }

    /// The build identity this executor updates against.
    pub fn build(&self) -> BuildInfo {
        self.build
    }

    /// The channel-independent paths in use.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }
}

/// Per-step progress weights: proportional to payload size when every
/// size is known, equal shares otherwise. Weights sum to 1 for a
/// non-empty plan.
fn step_weights(items: &[UpdateItem]) -> Vec<f64> {
    if items.is_empty() {
        return Vec::new();
    }

    let total: u64 = items.iter().map(|item| item.size).sum();
    if total > 0 && items.iter().all(|item| item.size > 0) {
        items
            .iter()
            .map(|item| item.size as f64 / total as f64)
            .collect()
    } else {
        vec![1.0 / items.len() as f64; items.len()]
    }
}

/// Startup consistency pass over every install recorded in `state`.
///
/// Restores installs left aside by an interrupted swap and removes
/// leftover staging directories.
pub fn restore_channel_installs(state: &AppState) -> Result<(), UpdateError> {
    for dep in state.dependencies.values() {
        wharf::restore_interrupted_swap(&dep.path)?;
    }
    Ok(())
}
