//! The injected core context.
//!
//! Everything that was process-global in earlier iterations (network
//! mode, keyring handle, manifest caches, the is-updating flag) lives
//! here as a field, built once at startup and shared behind an `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use launcher_bus::EventBus;
use launcher_launch::{GameSession, ServerSupervisor};
use launcher_net::{AuthController, Endpoints, Fetcher, NetworkMode, NewsCache};
use launcher_store::{AppState, BlobStore, Keyring, Paths};
use launcher_types::BuildInfo;
use launcher_update::{ManifestCache, UpdateExecutor, UpdatePlan};

use crate::error::LauncherError;
use crate::notifications::Notifications;

/// Shared context owning the launcher's singletons as fields.
pub struct Core {
    /// Build identity of this binary.
    pub build: BuildInfo,
    /// Storage layout.
    pub paths: Paths,
    /// Publisher service URLs.
    pub endpoints: Endpoints,
    /// Online/offline switch.
    pub mode: Arc<NetworkMode>,
    /// Encrypted blob store.
    pub store: Arc<BlobStore>,
    /// Identified HTTP client.
    pub fetcher: Arc<Fetcher>,
    /// Auth controller.
    pub auth: Arc<AuthController>,
    /// Manifest caches.
    pub manifests: Arc<ManifestCache>,
    /// Event fan-out to the UI bridge.
    pub bus: Arc<EventBus>,
    /// News feed cache.
    pub news: NewsCache,
    /// Toast-style notification sink for background failures.
    pub notifications: Notifications,
    /// Update executor.
    pub executor: UpdateExecutor,
    /// Local server supervisor.
    pub server: ServerSupervisor,
    /// Per-channel state of the selected channel.
    pub state: tokio::sync::RwLock<Option<AppState>>,
    /// The last computed update plan.
    pub plan: Mutex<UpdatePlan>,
    /// Current game session for online launches.
    pub session: Mutex<GameSession>,
    /// Cancellation for the in-flight update task.
    pub update_cancel: Mutex<Option<CancellationToken>>,
    is_updating: AtomicBool,
}

impl Core {
    /// Build the context from the environment.
    pub fn new(
        build: BuildInfo,
        paths: Paths,
        endpoints: Endpoints,
        keyring: Arc<Keyring>,
    ) -> Result<Arc<Core>, LauncherError> {
        let mode = Arc::new(NetworkMode::new(build));
        let store = Arc::new(BlobStore::new(keyring, build.is_dev()));
        let fetcher = Arc::new(Fetcher::new(build, Arc::clone(&mode))?);
        let manifests = Arc::new(ManifestCache::new());
        let bus = Arc::new(EventBus::new());

        let auth = Arc::new(AuthController::new(
            Arc::clone(&store),
            paths.clone(),
            reqwest::Client::new(),
            endpoints.token(),
        ));

        let executor = UpdateExecutor::new(
            Arc::clone(&fetcher),
            endpoints.clone(),
            Arc::clone(&manifests),
            Arc::clone(&bus),
            Arc::clone(&store),
            paths.clone(),
            build,
        );

        let server = ServerSupervisor::new(Arc::clone(&bus), paths.server_log_file());

        Ok(Arc::new(Core {
            build,
            paths,
            endpoints,
            mode,
            store,
            fetcher,
            auth,
            manifests,
            bus,
            news: NewsCache::new(),
            notifications: Notifications::new(),
            executor,
            server,
            state: tokio::sync::RwLock::new(None),
            plan: Mutex::new(UpdatePlan::default()),
            session: Mutex::new(GameSession::default()),
            update_cancel: Mutex::new(None),
            is_updating: AtomicBool::new(false),
        }))
    }

    /// Whether an update-apply task is running.
    pub fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::Acquire)
    }

    /// Try to become the single update task. `false` when one is running.
    pub(crate) fn mark_updating(&self) -> bool {
        self.is_updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the update guard.
    pub(crate) fn clear_updating(&self) {
        self.is_updating.store(false, Ordering::Release);
    }
}
