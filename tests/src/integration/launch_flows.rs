//! Launch guards, offline identity and server supervision.

#[cfg(test)]
mod tests {
    use launcher_net::{Endpoints, NetMode};
    use launcher_store::PlayerProfiles;
    use launcher_types::Channel;
    use uuid::Uuid;

    use crate::support::launcher_core;

    /// Offline launch with nothing installed is an auth failure and makes
    /// no network calls (the core is pointed at an unroutable host).
    #[tokio::test]
    async fn test_offline_launch_without_install_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = Endpoints {
            launcher_base: "http://127.0.0.1:1".to_string(),
            account_data_base: "http://127.0.0.1:1".to_string(),
        };
        let (core, _sink) = launcher_core(dir.path(), endpoints);
        core.mode.set(NetMode::Offline);

        let err = core.launch_game().await.unwrap_err();
        assert!(err.is_auth());
    }

    /// The offline identity is stable across launcher installs.
    #[tokio::test]
    async fn test_offline_identity_is_deterministic() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let (core_a, _) = launcher_core(dir_a.path(), Endpoints::default());
        let (core_b, _) = launcher_core(dir_b.path(), Endpoints::default());

        core_a.set_offline_player_name("gaia").unwrap();
        core_b.set_offline_player_name("gaia").unwrap();

        let uuid_a = PlayerProfiles::load(&core_a.paths)
            .unwrap()
            .get("gaia")
            .unwrap()
            .uuid;
        let uuid_b = PlayerProfiles::load(&core_b.paths)
            .unwrap()
            .get("gaia")
            .unwrap()
            .uuid;

        assert_eq!(uuid_a, uuid_b);
        assert_eq!(uuid_a, Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"gaia"));
    }

    /// A server cannot start without an installed game.
    #[tokio::test]
    async fn test_server_requires_install() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _sink) = launcher_core(dir.path(), Endpoints::default());
        core.select_channel(Channel::Release).await.unwrap();

        let err = core.start_server().await.unwrap_err();
        assert!(matches!(
            err,
            launcher_runtime::LauncherError::Launch(
                launcher_launch::LaunchError::GameNotInstalled
            )
        ));
    }

    /// The boot watchdog fires when the readiness line never appears, and
    /// the child's eventual exit is still reported.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_boot_timeout_sequence() {
        use launcher_bus::testing::RecordingSink;
        use launcher_bus::EventBus;
        use launcher_launch::{ServerLaunch, ServerSupervisor};
        use std::path::PathBuf;
        use std::sync::Arc;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let sink = Arc::new(RecordingSink::new());
        bus.set_sink(sink.clone());

        let supervisor = ServerSupervisor::new(bus, dir.path().join("server.log"))
            .with_boot_timeout(Duration::from_millis(150));

        supervisor
            .start(ServerLaunch {
                program: PathBuf::from("/bin/sh"),
                args: vec![
                    "-c".to_string(),
                    "echo 'loading chunks'; sleep 1".to_string(),
                ],
                working_dir: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        // Wait for the full sequence.
        for _ in 0..200 {
            if sink
                .event_names()
                .contains(&"server:stopped".to_string())
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let names = sink.event_names();
        let positions: Vec<usize> = ["server:starting", "server:boot_timeout", "server:stopped"]
            .iter()
            .map(|wanted| {
                names
                    .iter()
                    .position(|n| n == wanted)
                    .unwrap_or_else(|| panic!("missing {wanted} in {names:?}"))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!names.contains(&"server:ready".to_string()));
    }
}
