//! Network mode.
//!
//! A single online/offline switch consulted before every outbound call.
//! Startup flips it based on a best-effort connectivity probe; the user
//! can force offline from the UI. Dev builds may override offline mode
//! with an environment variable so network paths stay testable on a
//! disconnected machine.

use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use launcher_types::BuildInfo;

use crate::error::FetchError;

/// Environment variable overriding offline mode. Dev builds only.
pub const OFFLINE_OVERRIDE_ENV: &str = "HYTALE_LAUNCHER_OFFLINE_MODE";

/// Captive-portal style endpoints used by the connectivity probe.
const CONNECTIVITY_ENDPOINTS: [&str; 2] = [
    "http://connectivitycheck.gstatic.com/generate_204",
    "http://captive.apple.com/hotspot-detect.html",
];

/// The current network mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetMode {
    /// Normal operation.
    Online,
    /// No network calls; launches run with offline auth.
    Offline,
}

/// Shared holder for the network mode.
pub struct NetworkMode {
    mode: RwLock<NetMode>,
    build: BuildInfo,
}

impl NetworkMode {
    /// A holder starting in `Online`.
    pub fn new(build: BuildInfo) -> NetworkMode {
        NetworkMode {
            mode: RwLock::new(NetMode::Online),
            build,
        }
    }

    /// The current mode.
    pub fn current(&self) -> NetMode {
        *self.mode.read()
    }

    /// Switch modes.
    pub fn set(&self, mode: NetMode) {
        debug!(?mode, "network mode changed");
        *self.mode.write() = mode;
    }

    /// Whether the launcher is offline.
    pub fn is_offline(&self) -> bool {
        self.current() == NetMode::Offline
    }

    /// Guard for outbound calls.
    ///
    /// `Err(Offline)` when offline mode is set, unless the dev-only
    /// override variable is in force.
    pub fn offline_error(&self) -> Result<(), FetchError> {
        if self.build.is_dev() && std::env::var_os(OFFLINE_OVERRIDE_ENV).is_some() {
            return Ok(());
        }
        if self.is_offline() {
            return Err(FetchError::Offline);
        }
        Ok(())
    }

    /// Probe connectivity and set the mode accordingly.
    ///
    /// Best effort: any endpoint answering below 400 counts as online. All
    /// failures flip the launcher offline instead of raising.
    pub async fn probe(&self) -> NetMode {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(4))
            .build();

        let client = match client {
            Ok(client) => client,
            Err(_) => {
                self.set(NetMode::Offline);
                return NetMode::Offline;
            }
        };

        for endpoint in CONNECTIVITY_ENDPOINTS {
            match client.get(endpoint).send().await {
                Ok(resp) if resp.status().as_u16() < 400 => {
                    self.set(NetMode::Online);
                    return NetMode::Online;
                }
                Ok(_) | Err(_) => continue,
            }
        }

        self.set(NetMode::Offline);
        NetMode::Offline
    }
}
