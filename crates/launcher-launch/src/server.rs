//! Local server supervision.
//!
//! A server launch is a Java invocation whose stdout and stderr are
//! captured line-by-line into `server.log`. The supervisor watches for the
//! literal readiness line and emits lifecycle events:
//!
//! - `server:starting` immediately after spawn,
//! - `server:ready` on the readiness line,
//! - `server:boot_timeout` when the line has not appeared in time,
//! - `server:stopped` with the exit code (or error) when the child ends.
//!
//! Both output streams and the exit are funneled into one supervisor task
//! over a channel, so there is exactly one waiter per child. Only one
//! server runs at a time.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use launcher_bus::EventBus;

use crate::error::LaunchError;

/// The literal line the server prints when ready.
pub const BOOTED_LINE: &str = "Hytale Server Booted!";

/// How long the supervisor waits for the readiness line.
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// A server process to supervise.
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, already composed.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: PathBuf,
}

impl ServerLaunch {
    /// The standard Java invocation for a server jar.
    pub fn java(java_exec: PathBuf, server_jar: PathBuf, assets_zip: &str, working_dir: PathBuf) -> ServerLaunch {
        ServerLaunch {
            program: java_exec,
            args: vec![
                "-jar".to_string(),
                server_jar.display().to_string(),
                "--assets".to_string(),
                assets_zip.to_string(),
                "--auth-mode".to_string(),
                "offline".to_string(),
            ],
            working_dir,
        }
    }
}

struct ServerHandle {
    stop: CancellationToken,
}

/// Supervises at most one local server process.
pub struct ServerSupervisor {
    bus: Arc<EventBus>,
    log_path: PathBuf,
    boot_timeout: Duration,
    handle: Arc<Mutex<Option<ServerHandle>>>,
}

enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl ServerSupervisor {
    /// A supervisor writing captured output to `log_path`.
    pub fn new(bus: Arc<EventBus>, log_path: PathBuf) -> ServerSupervisor {
        ServerSupervisor {
            bus,
            log_path,
            boot_timeout: BOOT_TIMEOUT,
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the boot watchdog duration (tests).
    pub fn with_boot_timeout(mut self, timeout: Duration) -> ServerSupervisor {
        self.boot_timeout = timeout;
        self
    }

    /// Whether a server is currently supervised.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Spawn and supervise a server.
    ///
    /// Fails with [`LaunchError::ServerAlreadyRunning`] while a previous
    /// server is still supervised.
    pub async fn start(&self, launch: ServerLaunch) -> Result<(), LaunchError> {
        let stop = {
            let mut guard = self.handle.lock();
            if guard.is_some() {
                return Err(LaunchError::ServerAlreadyRunning);
            }
            let stop = CancellationToken::new();
            *guard = Some(ServerHandle { stop: stop.clone() });
            stop
        };

        let spawned = self.spawn_child(&launch);
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                *self.handle.lock() = None;
                return Err(err);
            }
        };

        info!(program = %launch.program.display(), "server spawned");
        self.bus.emit_named("server:starting");

        let (line_tx, line_rx) = mpsc::channel::<OutputLine>(256);

        if let Some(stdout) = child.stdout.take() {
            let tx = line_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(OutputLine::Stdout(line)).await.is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = line_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(OutputLine::Stderr(line)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(line_tx);

        let bus = Arc::clone(&self.bus);
        let handle = Arc::clone(&self.handle);
        let log_path = self.log_path.clone();
        let boot_timeout = self.boot_timeout;

        tokio::spawn(async move {
            supervise(child, line_rx, stop, bus, handle, log_path, boot_timeout).await;
        });

        Ok(())
    }

    /// Ask the supervised server to stop.
    pub fn stop(&self) -> Result<(), LaunchError> {
        let guard = self.handle.lock();
        match guard.as_ref() {
            Some(handle) => {
                info!("stopping server");
                handle.stop.cancel();
                Ok(())
            }
            None => Err(LaunchError::ServerNotRunning),
        }
    }

    fn spawn_child(&self, launch: &ServerLaunch) -> Result<tokio::process::Child, LaunchError> {
        std::fs::create_dir_all(&launch.working_dir)?;
        let child = Command::new(&launch.program)
            .args(&launch.args)
            .current_dir(&launch.working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

/// The single waiter: drains output, runs the watchdog, reaps the child.
async fn supervise(
    mut child: tokio::process::Child,
    mut lines: mpsc::Receiver<OutputLine>,
    stop: CancellationToken,
    bus: Arc<EventBus>,
    handle: Arc<Mutex<Option<ServerHandle>>>,
    log_path: PathBuf,
    boot_timeout: Duration,
) {
    let mut log = std::fs::File::create(&log_path)
        .map_err(|e| warn!(path = %log_path.display(), error = %e, "could not open server log"))
        .ok();

    let watchdog = tokio::time::sleep(boot_timeout);
    tokio::pin!(watchdog);

    let mut booted = false;
    let mut watchdog_armed = true;
    let mut killed = false;

    loop {
        tokio::select! {
            () = &mut watchdog, if watchdog_armed => {
                watchdog_armed = false;
                if !booted {
                    warn!("server did not report readiness in time");
                    bus.emit_named("server:boot_timeout");
                }
            }
            () = stop.cancelled(), if !killed => {
                killed = true;
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill server process");
                }
            }
            line = lines.recv() => {
                match line {
                    Some(line) => {
                        let text = match &line {
                            OutputLine::Stdout(text) | OutputLine::Stderr(text) => text,
                        };
                        if let Some(log) = log.as_mut() {
                            let _ = writeln!(log, "{text}");
                        }
                        if !booted && text.contains(BOOTED_LINE) {
                            booted = true;
                            watchdog_armed = false;
                            info!("server reported ready");
                            bus.emit_named("server:ready");
                        }
                    }
                    // Both streams closed: the child is going away.
                    None => break,
                }
            }
        }
    }

    let payload = match child.wait().await {
        Ok(status) => {
            info!(code = ?status.code(), "server exited");
            serde_json::json!({ "code": status.code() })
        }
        Err(err) => {
            warn!(error = %err, "failed to wait for server process");
            serde_json::json!({ "error": err.to_string() })
        }
    };

    *handle.lock() = None;
    bus.emit("server:stopped", payload);
}
