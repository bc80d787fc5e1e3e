//! Startup wiring.
//!
//! The fixed order on process start:
//!
//! 1. Trim an oversized launcher log.
//! 2. Self-update cleanup: read-and-delete the cleanup note and remove
//!    the previous launcher install. A note that cannot be read is fatal.
//! 3. Write the embedded legal texts into the storage dir.
//! 4. Probe connectivity and set the network mode.
//! 5. Restore the account session from disk.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use launcher_store::Paths;
use launcher_update::selfupdate;

use crate::core::Core;
use crate::error::LauncherError;

/// Embedded EULA text, extracted into the storage dir.
pub const EULA_TEXT: &str = include_str!("../assets/eula.txt");

/// Embedded third-party license text, extracted into the storage dir.
pub const LICENSES_TEXT: &str = include_str!("../assets/third-party-licenses.txt");

/// Delete the launcher log when it exceeds this size.
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// How often the manifest caches are dropped for a re-poll.
const REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Remove an oversized log file before logging initializes.
pub fn trim_oversized_log(paths: &Paths) {
    let log = paths.log_file();
    if let Ok(meta) = std::fs::metadata(&log) {
        if meta.len() > MAX_LOG_SIZE {
            if let Err(err) = std::fs::remove_file(&log) {
                eprintln!("failed to remove oversized log {}: {err}", log.display());
            }
        }
    }
}

/// Write the embedded legal texts into the storage dir. Best effort.
pub fn write_legal_files(paths: &Paths) {
    let targets = [
        (paths.in_storage("eula.txt"), EULA_TEXT),
        (paths.in_storage("third-party-licenses.txt"), LICENSES_TEXT),
    ];

    for (path, contents) in targets {
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %err, "could not create legal file directory");
                continue;
            }
        }
        if let Err(err) = std::fs::write(&path, contents) {
            warn!(path = %path.display(), error = %err, "could not write legal file");
        }
    }
}

/// Run the startup sequence against a built core.
pub async fn run_startup(core: &Arc<Core>) -> Result<(), LauncherError> {
    // Before any other launcher logic: remove the install a completed
    // self-update left behind. An unreadable note is fatal.
    selfupdate::cleanup_old_launcher(&core.store, &core.paths)?;

    write_legal_files(&core.paths);

    let mode = core.mode.probe().await;
    info!(?mode, "connectivity probe complete");

    core.auth.init().await;
    Ok(())
}

/// Periodically drop the manifest caches so long-lived processes re-poll.
///
/// Returns a token; cancel it to stop the refresher.
pub fn spawn_refresher(core: Arc<Core>) -> CancellationToken {
    let stop = CancellationToken::new();
    let token = stop.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    info!("refreshing cached application state");
                    core.manifests.invalidate_all();
                    if let Err(err) = core.news_articles(true).await {
                        warn!(error = %err, "background news refresh failed");
                        core.notifications.error("News unavailable", &err);
                    }
                }
            }
        }
    });

    stop
}
