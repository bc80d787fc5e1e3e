//! State lifecycle across platforms and resets.

#[cfg(test)]
mod tests {
    use launcher_net::Endpoints;
    use launcher_store::{AppState, Dependency, StoreError};
    use launcher_types::{Channel, PackageId, Platform};

    use crate::support::launcher_core;

    /// A state file written on another platform refuses to load; an
    /// explicit reset replaces it with a fresh state for this platform.
    #[tokio::test]
    async fn test_platform_mismatch_then_reset() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _sink) = launcher_core(dir.path(), Endpoints::default());

        // Write a state claiming a foreign platform, with dependencies.
        let mut foreign = AppState::new(Channel::Release);
        foreign.platform = Platform {
            os: "linux".to_string(),
            arch: if Platform::current().arch == "arm64" {
                "amd64".to_string()
            } else {
                "arm64".to_string()
            },
        };
        foreign.set_dependency(
            "game",
            "seed",
            Some(Dependency {
                name: "game".to_string(),
                version: "42".to_string(),
                build_id: 42,
                path: dir.path().join("release/package/game/42"),
            }),
        );
        foreign.write_file(&core.store, &core.paths).unwrap();

        let err = core.select_channel(Channel::Release).await.unwrap_err();
        assert!(matches!(
            err,
            launcher_runtime::LauncherError::Store(StoreError::PlatformMismatch { .. })
        ));

        core.reset_channel(Channel::Release).await.unwrap();

        let fresh = AppState::load(&core.store, &core.paths, Channel::Release).unwrap();
        assert_eq!(fresh.platform, Platform::current());
        assert!(fresh.dependencies.is_empty());
    }

    /// Round trip: what was saved is what loads, for the same platform.
    #[tokio::test]
    async fn test_state_round_trip_preserves_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _sink) = launcher_core(dir.path(), Endpoints::default());

        core.select_channel(Channel::Beta).await.unwrap();
        {
            let mut guard = core.state.write().await;
            let state = guard.as_mut().unwrap();
            state.set_dependency(
                "jre",
                "seed",
                Some(Dependency {
                    name: "jre".to_string(),
                    version: "17.0.9".to_string(),
                    build_id: 3,
                    path: dir.path().join("beta/package/jre/17.0.9"),
                }),
            );
            state.save(&core.store, &core.paths, "seed");
        }

        let loaded = AppState::load(&core.store, &core.paths, Channel::Beta).unwrap();
        assert_eq!(
            loaded.package_dependency(PackageId::Jre).unwrap().version,
            "17.0.9"
        );
        assert!(!loaded.is_new);
        assert!(!loaded.offline_ready);
    }

    /// Channels keep independent trees and state records.
    #[tokio::test]
    async fn test_channels_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _sink) = launcher_core(dir.path(), Endpoints::default());

        core.select_channel(Channel::Release).await.unwrap();
        {
            let mut guard = core.state.write().await;
            let state = guard.as_mut().unwrap();
            state.set_dependency(
                "game",
                "seed",
                Some(Dependency {
                    name: "game".to_string(),
                    version: "42".to_string(),
                    build_id: 42,
                    path: dir.path().join("release/package/game/42"),
                }),
            );
            state.save(&core.store, &core.paths, "seed");
        }

        core.select_channel(Channel::Beta).await.unwrap();
        assert_eq!(core.game_version().await, None);

        core.select_channel(Channel::Release).await.unwrap();
        assert_eq!(core.game_version().await.as_deref(), Some("42"));
    }
}
