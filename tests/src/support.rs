//! Shared fixtures: a local publisher serving manifests, archives and
//! patches, plus a fully wired launcher core pointed at it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path as AxumPath;
use axum::http::StatusCode;
use axum::routing::get;

use launcher_bus::testing::RecordingSink;
use launcher_net::Endpoints;
use launcher_runtime::Core;
use launcher_store::{Account, Keyring, MemorySecretStore, Paths, Profile, Token};
use launcher_types::{BuildInfo, Platform};
use launcher_update::testing::{full_patch_manifest, write_patch, write_tar_gz, write_zip};

/// Version the fixture launcher binary reports.
pub const RUNNING_LAUNCHER_VERSION: &str = "1.0";

/// Version the fixture publisher advertises for the launcher.
pub const PUBLISHED_LAUNCHER_VERSION: &str = "2.0";

/// Version the fixture publisher advertises for the Java runtime.
pub const PUBLISHED_JRE_VERSION: &str = "17.0.9";

/// What the fixture publisher serves.
pub struct PublisherConfig {
    /// Launcher version advertised in the manifest.
    pub launcher_version: &'static str,
    /// Newest game build advertised on the `release` patchline.
    pub newest_build: u64,
    /// Target files delivered by the game patch.
    pub patch_files: Vec<(&'static str, Vec<u8>)>,
    /// Serve 404 for every patch request (no patch published).
    pub patch_missing: bool,
    /// Delay before answering a patch request.
    pub patch_delay: Duration,
    /// Corrupt the patch's embedded signature so verification fails.
    pub patch_bad_signature: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig {
            launcher_version: PUBLISHED_LAUNCHER_VERSION,
            newest_build: 42,
            patch_files: vec![
                ("Client/hytale-client", b"client v42".to_vec()),
                ("Server/hytale-server.jar", b"server v42".to_vec()),
            ],
            patch_missing: false,
            patch_delay: Duration::ZERO,
            patch_bad_signature: false,
        }
    }
}

/// Serve the fixture publisher on an ephemeral port.
pub async fn serve_publisher(config: PublisherConfig) -> Endpoints {
    let scratch = tempfile::tempdir().expect("fixture scratch");

    // Launcher archive.
    let launcher_zip = scratch.path().join("launcher.zip");
    write_zip(
        &launcher_zip,
        &[("launcher.bin", b"launcher v2"), ("LICENSE", b"license")],
    );
    let launcher_bytes = std::fs::read(&launcher_zip).expect("read launcher zip");

    // Java archive with a wrapper directory, stripped on extraction.
    let jre_tar = scratch.path().join("jre.tar.gz");
    write_tar_gz(
        &jre_tar,
        &[
            ("jdk-17.0.9/bin/java", b"java binary"),
            ("jdk-17.0.9/lib/rt", b"runtime"),
        ],
    );
    let jre_bytes = std::fs::read(&jre_tar).expect("read jre tar");

    // Game patch.
    let files: Vec<(&str, &[u8])> = config
        .patch_files
        .iter()
        .map(|(name, data)| (*name, data.as_slice()))
        .collect();
    let (mut manifest, blobs) = full_patch_manifest(0, config.newest_build, &files);
    if config.patch_bad_signature {
        manifest
            .signature
            .files
            .insert("phantom-file".to_string(), "00".repeat(32));
    }
    let patch_file = scratch.path().join("patch");
    let blob_refs: Vec<&[u8]> = blobs.iter().map(|b| b.as_slice()).collect();
    write_patch(&patch_file, &manifest, &blob_refs);
    let patch_bytes = std::fs::read(&patch_file).expect("read patch");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture addr");
    let base = format!("http://{addr}");

    let platform = Platform::current().id();
    let launcher_manifest = serde_json::json!({
        "version": config.launcher_version,
        "url": format!("{base}/dist/launcher-2.0.zip"),
        "size": launcher_bytes.len(),
    });
    let jre_manifest = serde_json::json!({
        "channels": {
            "release": {
                "version": PUBLISHED_JRE_VERSION,
                "url": format!("{base}/dist/jre-17.0.9.tar.gz"),
                "size": jre_bytes.len(),
            }
        }
    });
    let launcher_data = serde_json::json!({
        "patchlines": {
            "release": { "newest_build": config.newest_build, "flags": [] }
        }
    });

    let patch_missing = config.patch_missing;
    let patch_delay = config.patch_delay;

    let router = axum::Router::new()
        .route(
            &format!("/version/{platform}/launcher.json"),
            get(move || {
                let manifest = launcher_manifest.clone();
                async move { axum::Json(manifest) }
            }),
        )
        .route(
            &format!("/version/{platform}/jre.json"),
            get(move || {
                let manifest = jre_manifest.clone();
                async move { axum::Json(manifest) }
            }),
        )
        .route(
            "/launcher-data",
            get(move || {
                let data = launcher_data.clone();
                async move { axum::Json(data) }
            }),
        )
        .route(
            "/dist/launcher-2.0.zip",
            get(move || {
                let bytes = launcher_bytes.clone();
                async move { bytes }
            }),
        )
        .route(
            "/dist/jre-17.0.9.tar.gz",
            get(move || {
                let bytes = jre_bytes.clone();
                async move { bytes }
            }),
        )
        .route(
            "/patches/:os/:arch/:channel/:build",
            get(
                move |AxumPath((_os, _arch, _channel, _build)): AxumPath<(
                    String,
                    String,
                    String,
                    u64,
                )>| {
                    let bytes = patch_bytes.clone();
                    async move {
                        if patch_delay > Duration::ZERO {
                            tokio::time::sleep(patch_delay).await;
                        }
                        if patch_missing {
                            Err(StatusCode::NOT_FOUND)
                        } else {
                            Ok(bytes)
                        }
                    }
                },
            ),
        );

    tokio::spawn(async move {
        // Keep the archive scratch alive for the server's lifetime.
        let _scratch = scratch;
        axum::serve(listener, router).await.expect("fixture server");
    });

    Endpoints {
        launcher_base: base.clone(),
        account_data_base: base,
    }
}

/// A wired core with a recording sink, rooted in a temp dir.
pub fn launcher_core(dir: &std::path::Path, endpoints: Endpoints) -> (Arc<Core>, Arc<RecordingSink>) {
    let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
    let core = Core::new(
        BuildInfo {
            release: "release",
            version: RUNNING_LAUNCHER_VERSION,
        },
        Paths::with_root(dir),
        endpoints,
        Arc::new(keyring),
    )
    .expect("build core");

    let sink = Arc::new(RecordingSink::new());
    core.bus.set_sink(sink.clone());
    (core, sink)
}

/// An account entitled to the `release` patchline, with a fresh token.
pub fn entitled_account() -> Account {
    let profile = Profile {
        uuid: uuid::Uuid::new_v4(),
        username: "kweebec".to_string(),
        token: Token {
            access_token: "at-test".to_string(),
            refresh_token: "rt-test".to_string(),
            expiry: chrono::Utc::now() + chrono::Duration::hours(1),
        },
        entitlements: vec!["patchline:release".to_string()],
    };
    let uuid = profile.uuid;
    let mut account = Account {
        profiles: vec![profile],
        ..Account::default()
    };
    account.select_profile(uuid);
    account
}

/// `(event, package)` pairs for the lifecycle events, in arrival order.
pub fn lifecycle_events(sink: &RecordingSink) -> Vec<(String, String)> {
    sink.events()
        .into_iter()
        .filter(|(name, _)| matches!(name.as_str(), "checking" | "applying" | "complete" | "error"))
        .map(|(name, payload)| {
            let package = payload
                .get("package")
                .and_then(|p| p.as_str())
                .unwrap_or_default()
                .to_string();
            (name, package)
        })
        .collect()
}
