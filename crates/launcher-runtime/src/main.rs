//! Hytale launcher entry point.
//!
//! Builds the core context, runs the startup sequence and keeps the
//! process alive for the embedded web view (which attaches to the event
//! bus through the bridge). Ctrl+C shuts down cleanly.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use launcher_net::Endpoints;
use launcher_runtime::{startup, Core};
use launcher_store::{Keyring, Paths};
use launcher_types::{BuildInfo, Channel};

fn init_tracing(paths: &Paths) -> anyhow::Result<()> {
    std::fs::create_dir_all(paths.storage_dir())
        .with_context(|| format!("creating storage dir {}", paths.storage_dir().display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_file())
        .with_context(|| format!("opening log file {}", paths.log_file().display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let build = BuildInfo::current();
    let paths = Paths::detect();

    startup::trim_oversized_log(&paths);
    init_tracing(&paths)?;

    info!(
        release = build.release,
        version = build.version,
        storage = %paths.storage_dir().display(),
        "hytale launcher starting"
    );

    let core = Core::new(
        build,
        paths,
        Endpoints::default(),
        Arc::new(Keyring::system()),
    )
    .context("building launcher core")?;

    startup::run_startup(&core)
        .await
        .context("startup sequence failed")?;

    // Pick up where the user left off: the account's selected channel,
    // falling back to release.
    let channel = core
        .auth
        .account()
        .and_then(|account| account.selected_channel)
        .unwrap_or(Channel::Release);
    if let Err(err) = core.select_channel(channel).await {
        warn!(channel = %channel, error = %err, "could not load channel state");
    }

    let refresher = startup::spawn_refresher(Arc::clone(&core));

    info!("launcher ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    info!("shutting down");
    refresher.cancel();
    if core.server.is_running() {
        if let Err(err) = core.stop_server() {
            warn!(error = %err, "failed to stop server during shutdown");
        }
    }

    Ok(())
}
