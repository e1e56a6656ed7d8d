//! Core daemon process: startup, shutdown, and main accept loop.
//!
//! Startup order: clear a stale socket (refusing to start if a live daemon
//! still listens on it), bind the socket, write the PID marker, start the
//! playback worker, then accept until the [`ShutdownFlag`] is raised. Once
//! the bind succeeds, the socket and PID files are removed on every exit
//! path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chuuni_config::AppConfig;
use chuuni_config::policy::AdmissionPolicy;

use crate::admission::AdmissionController;
use crate::ipc::server::{self, IpcState};
use crate::ipc::{IpcClient, IpcClientError};
use crate::player::{PlayerResolver, SystemPlayer};
use crate::queue::PlaybackQueue;
use crate::worker;

/// How long startup waits for an existing socket to answer before treating
/// it as stale.
const LIVENESS_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Cooperative stop request shared by the accept loop, the `stop` handler
/// and the signal listener.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("another daemon is already answering on {0}")]
    AlreadyRunning(PathBuf),

    #[error("failed to bind socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("accept loop failed: {0}")]
    Accept(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The chuuni playback daemon.
pub struct Daemon {
    socket_path: PathBuf,
    pid_file: PathBuf,
    policy: AdmissionPolicy,
    player: Arc<dyn PlayerResolver>,
    shutdown: ShutdownFlag,
}

impl Daemon {
    /// Create a daemon from the loaded configuration, playing through the
    /// host's audio tools.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            socket_path: config.socket_path(),
            pid_file: config.pid_file(),
            policy: config.build_admission_policy(),
            player: Arc::new(SystemPlayer),
            shutdown: ShutdownFlag::default(),
        }
    }

    /// Replace the player resolver.
    pub fn with_player(mut self, player: Arc<dyn PlayerResolver>) -> Self {
        self.player = player;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// A handle that stops [`run`](Self::run) when raised.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        self.shutdown.request();
    }

    /// Raise the shutdown flag on SIGINT or SIGTERM.
    #[cfg(unix)]
    pub fn spawn_signal_listener(&self) -> std::io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let flag = self.shutdown.clone();
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => warn!("SIGINT received, initiating graceful shutdown"),
                _ = terminate.recv() => warn!("SIGTERM received, initiating graceful shutdown"),
            }
            flag.request();
        }))
    }

    /// Run the daemon until a shutdown is requested.
    pub async fn run(&self) -> Result<(), DaemonError> {
        for path in [&self.socket_path, &self.pid_file] {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        self.clear_stale_socket().await?;

        // Nothing is cleaned up on a failed bind: the path may belong to a
        // daemon that won a concurrent start.
        let listener = UnixListener::bind(&self.socket_path).map_err(|source| DaemonError::Bind {
            path: self.socket_path.clone(),
            source,
        })?;
        let mut guard = RunGuard {
            socket_path: &self.socket_path,
            pid_file: None,
            worker: None,
        };

        tokio::fs::write(&self.pid_file, std::process::id().to_string()).await?;
        guard.pid_file = Some(&self.pid_file);

        let queue = Arc::new(PlaybackQueue::default());
        guard.worker = Some(worker::spawn(Arc::clone(&queue), Arc::clone(&self.player)));

        let state = Arc::new(IpcState {
            controller: Arc::new(AdmissionController::new(self.policy.clone(), queue)),
            shutdown: self.shutdown.clone(),
        });

        info!(
            socket = %self.socket_path.display(),
            pid = std::process::id(),
            "chuuni daemon listening"
        );

        server::serve(&listener, state)
            .await
            .map_err(DaemonError::Accept)?;

        info!("daemon stopped");
        Ok(())
    }

    /// Remove a leftover socket file, unless a daemon still answers on it.
    async fn clear_stale_socket(&self) -> Result<(), DaemonError> {
        if !self.socket_path.exists() {
            return Ok(());
        }

        // Only a refused connection proves nobody is listening. A listener
        // that is slow to answer may be a daemon that has just bound.
        let probe = IpcClient::new(&self.socket_path).with_timeout(LIVENESS_PROBE_TIMEOUT);
        match probe.status().await {
            Err(e @ (IpcClientError::NotRunning(_) | IpcClientError::Connect { .. })) => {
                debug!(error = %e, "existing socket is stale")
            }
            Ok(_) => return Err(DaemonError::AlreadyRunning(self.socket_path.clone())),
            Err(e) => {
                debug!(error = %e, "socket is listening, treating as live");
                return Err(DaemonError::AlreadyRunning(self.socket_path.clone()));
            }
        }

        info!(socket = %self.socket_path.display(), "removing stale socket");
        match tokio::fs::remove_file(&self.socket_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("socket_path", &self.socket_path)
            .field("pid_file", &self.pid_file)
            .field("policy", &self.policy)
            .field("shutdown", &self.shutdown.is_requested())
            .finish()
    }
}

/// Removes the runtime artifacts this process created and stops the worker
/// when dropped.
struct RunGuard<'a> {
    socket_path: &'a Path,
    pid_file: Option<&'a Path>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        for path in std::iter::once(self.socket_path).chain(self.pid_file) {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cleanup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chuuni_config::DaemonConfig;

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            daemon: DaemonConfig {
                socket_path: Some(dir.join("chuuni.sock").display().to_string()),
                pid_file: Some(dir.join("chuuni.pid").display().to_string()),
                log_file: None,
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_shutdown_flag_is_shared() {
        let flag = ShutdownFlag::default();
        let other = flag.clone();
        assert!(!other.is_requested());
        flag.request();
        assert!(other.is_requested());
    }

    #[test]
    fn test_daemon_creation() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(&config_in(dir.path()));
        assert_eq!(daemon.socket_path(), dir.path().join("chuuni.sock"));
        assert_eq!(daemon.pid_file(), dir.path().join("chuuni.pid"));
        assert_eq!(daemon.policy().session_limit_for("thinking"), 1);
    }

    #[tokio::test]
    async fn test_preset_flag_exits_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(&config_in(dir.path()));
        daemon.shutdown();

        tokio::time::timeout(Duration::from_secs(3), daemon.run())
            .await
            .unwrap()
            .unwrap();
        assert!(!daemon.socket_path().exists());
        assert!(!daemon.pid_file().exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(&config_in(dir.path()));
        drop(std::os::unix::net::UnixListener::bind(daemon.socket_path()).unwrap());
        assert!(daemon.socket_path().exists());

        daemon.clear_stale_socket().await.unwrap();
        assert!(!daemon.socket_path().exists());
    }

    #[tokio::test]
    async fn test_silent_listener_is_not_treated_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(&config_in(dir.path()));
        let _listener = UnixListener::bind(daemon.socket_path()).unwrap();

        let err = daemon.clear_stale_socket().await.unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning(_)), "got {err:?}");
        assert!(daemon.socket_path().exists());
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_no_runtime_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        // Longer than sockaddr_un allows.
        let long = dir.path().join(format!("{}.sock", "x".repeat(120)));
        config.daemon.socket_path = Some(long.display().to_string());

        let daemon = Daemon::new(&config);
        let err = daemon.run().await.unwrap_err();
        assert!(matches!(err, DaemonError::Bind { .. }), "got {err:?}");
        assert!(!daemon.pid_file().exists());
    }
}
