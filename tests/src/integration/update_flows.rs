//! End-to-end update flows against the fixture publisher.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use launcher_store::{AppState, Dependency, LKG_DEP};
    use launcher_types::{Channel, PackageId};

    use crate::support::{
        entitled_account, launcher_core, lifecycle_events, serve_publisher, PublisherConfig,
        PUBLISHED_JRE_VERSION, PUBLISHED_LAUNCHER_VERSION,
    };

    /// Fresh install: all three packages update, events in strict package
    /// order, dependencies recorded, payloads on disk.
    #[tokio::test]
    async fn test_fresh_install_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_publisher(PublisherConfig::default()).await;
        let (core, sink) = launcher_core(dir.path(), endpoints);

        core.auth.set_account(entitled_account()).await;
        core.select_channel(Channel::Release).await.unwrap();

        let items = core.check_for_updates().await.unwrap();
        let names: Vec<PackageId> = items.iter().map(|i| i.name).collect();
        assert_eq!(
            names,
            vec![PackageId::Launcher, PackageId::Jre, PackageId::Game]
        );

        core.apply_updates().await.unwrap();

        // Events per package, strictly ordered: the next package's
        // `checking` only after the previous `complete`.
        let expected: Vec<(String, String)> = [
            ("checking", "launcher"),
            ("applying", "launcher"),
            ("complete", "launcher"),
            ("checking", "jre"),
            ("applying", "jre"),
            ("complete", "jre"),
            ("checking", "game"),
            ("applying", "game"),
            ("complete", "game"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        assert_eq!(lifecycle_events(&sink), expected);
        assert!(sink
            .event_names()
            .contains(&"update:complete".to_string()));

        // Final state: all three dependencies recorded.
        let state = AppState::load(&core.store, &core.paths, Channel::Release).unwrap();
        assert_eq!(
            state.package_dependency(PackageId::Launcher).unwrap().version,
            PUBLISHED_LAUNCHER_VERSION
        );
        assert_eq!(
            state.package_dependency(PackageId::Jre).unwrap().version,
            PUBLISHED_JRE_VERSION
        );
        let game = state.package_dependency(PackageId::Game).unwrap();
        assert_eq!(game.build_id, 42);

        // Payloads landed where the dependencies say.
        assert!(state
            .package_dependency(PackageId::Jre)
            .unwrap()
            .path
            .join("bin/java")
            .is_file());
        assert!(game.path.join("Client/hytale-client").is_file());
        assert!(game.sig_path().is_file());

        // Download scratch is clean.
        let leftovers = std::fs::read_dir(core.paths.cache_dir())
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    /// A 404 patch means "no patch for this version": the game step
    /// completes without an error event and without touching state.
    #[tokio::test]
    async fn test_patch_404_advances_without_change() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_publisher(PublisherConfig {
            launcher_version: crate::support::RUNNING_LAUNCHER_VERSION,
            newest_build: 43,
            patch_missing: true,
            ..PublisherConfig::default()
        })
        .await;
        let (core, sink) = launcher_core(dir.path(), endpoints);

        core.auth.set_account(entitled_account()).await;
        core.select_channel(Channel::Release).await.unwrap();

        // Pretend launcher and jre are current and game sits at build 42.
        {
            let mut guard = core.state.write().await;
            let state = guard.as_mut().unwrap();
            seed_current_install(state, &core.paths);
            state.save(&core.store, &core.paths, "seed");
        }

        let items = core.check_for_updates().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, PackageId::Game);

        core.apply_updates().await.unwrap();

        let events = lifecycle_events(&sink);
        let game_events: Vec<&str> = events
            .iter()
            .filter(|(_, pkg)| pkg == "game")
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(game_events, vec!["checking", "complete"]);
        assert!(!events.iter().any(|(name, _)| name == "error"));

        // No pending update remains and the dependency is untouched.
        assert!(core.pending_updates().is_empty());
        let state = AppState::load(&core.store, &core.paths, Channel::Release).unwrap();
        assert_eq!(state.package_dependency(PackageId::Game).unwrap().build_id, 42);
    }

    /// Cancelling while the game download is in flight leaves no temp
    /// files and no state change, and emits `update:cancelled`.
    #[tokio::test]
    async fn test_cancel_mid_download() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_publisher(PublisherConfig {
            launcher_version: crate::support::RUNNING_LAUNCHER_VERSION,
            newest_build: 43,
            patch_delay: Duration::from_millis(500),
            ..PublisherConfig::default()
        })
        .await;
        let (core, sink) = launcher_core(dir.path(), endpoints);

        core.auth.set_account(entitled_account()).await;
        core.select_channel(Channel::Release).await.unwrap();
        {
            let mut guard = core.state.write().await;
            let state = guard.as_mut().unwrap();
            seed_current_install(state, &core.paths);
            state.save(&core.store, &core.paths, "seed");
        }

        core.check_for_updates().await.unwrap();

        let apply_core = core.clone();
        let apply = tokio::spawn(async move { apply_core.apply_updates().await });

        tokio::time::sleep(Duration::from_millis(120)).await;
        core.cancel_updates();

        let result = apply.await.unwrap();
        assert!(result.unwrap_err().is_cancelled());

        let names = sink.event_names();
        assert!(names.contains(&"update:cancelled".to_string()));
        assert!(!lifecycle_events(&sink)
            .iter()
            .any(|(name, pkg)| name == "complete" && pkg == "game"));

        // No temp file survives in the cache.
        let leftovers = std::fs::read_dir(core.paths.cache_dir())
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);

        // State on disk unchanged.
        let state = AppState::load(&core.store, &core.paths, Channel::Release).unwrap();
        assert_eq!(state.package_dependency(PackageId::Game).unwrap().build_id, 42);
    }

    /// A patch that fails verification after demotion rolls back: the
    /// game dependency and directory are exactly as before the attempt.
    #[tokio::test]
    async fn test_failed_game_patch_rolls_back_to_lkg() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = serve_publisher(PublisherConfig {
            launcher_version: crate::support::RUNNING_LAUNCHER_VERSION,
            newest_build: 43,
            patch_bad_signature: true,
            ..PublisherConfig::default()
        })
        .await;
        let (core, sink) = launcher_core(dir.path(), endpoints);

        core.auth.set_account(entitled_account()).await;
        core.select_channel(Channel::Release).await.unwrap();

        let game_dir = {
            let mut guard = core.state.write().await;
            let state = guard.as_mut().unwrap();
            seed_current_install(state, &core.paths);
            state.save(&core.store, &core.paths, "seed");
            state.package_dependency(PackageId::Game).unwrap().path.clone()
        };

        core.check_for_updates().await.unwrap();
        let err = core.apply_updates().await.unwrap_err();
        assert!(!err.is_cancelled());

        // The executor emitted the error event for the game step.
        assert!(lifecycle_events(&sink)
            .iter()
            .any(|(name, pkg)| name == "error" && pkg == "game"));

        // Dependencies restored to their pre-attempt values.
        let state = AppState::load(&core.store, &core.paths, Channel::Release).unwrap();
        let game = state.package_dependency(PackageId::Game).unwrap();
        assert_eq!(game.build_id, 42);
        assert_eq!(game.path, game_dir);
        assert!(state.dependency(LKG_DEP).is_none());

        // The install itself survived the failed attempt.
        assert!(game_dir.join("Client/hytale-client").is_file());
        assert!(!core
            .paths
            .package_dir(PackageId::Game, Channel::Release, "43")
            .exists());
    }

    /// Seed a state that is current for launcher and jre and holds game
    /// build 42 on disk.
    fn seed_current_install(state: &mut AppState, paths: &launcher_store::Paths) {
        let jre_dir = paths.package_dir(PackageId::Jre, Channel::Release, PUBLISHED_JRE_VERSION);
        std::fs::create_dir_all(jre_dir.join("bin")).unwrap();
        std::fs::write(jre_dir.join("bin/java"), b"java binary").unwrap();
        state.set_dependency(
            "jre",
            "seed",
            Some(Dependency {
                name: "jre".to_string(),
                version: PUBLISHED_JRE_VERSION.to_string(),
                build_id: 1,
                path: jre_dir,
            }),
        );

        let game_dir = paths.package_dir(PackageId::Game, Channel::Release, "42");
        std::fs::create_dir_all(game_dir.join("Client")).unwrap();
        std::fs::write(game_dir.join("Client/hytale-client"), b"client v42").unwrap();
        state.set_dependency(
            "game",
            "seed",
            Some(Dependency {
                name: "game".to_string(),
                version: "42".to_string(),
                build_id: 42,
                path: game_dir,
            }),
        );
    }
}
