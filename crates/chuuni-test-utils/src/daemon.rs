//! In-process daemon fixture.
//!
//! [`TestDaemon`] runs a real [`Daemon`] on a socket inside its own temp
//! directory, waits until it answers, and hands out clients for it. The temp
//! directory is deleted when the fixture is dropped, even on panic.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chuuni_config::AppConfig;
use chuuni_core::daemon::DaemonError;
use chuuni_core::ipc::IpcClient;
use chuuni_core::launcher;
use chuuni_core::{Daemon, ShutdownFlag};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::config::TestConfigBuilder;
use crate::player::ScriptedPlayer;

/// How long a test daemon gets to start answering.
const READY_TIMEOUT: Duration = Duration::from_secs(3);

/// A running daemon scoped to one test.
pub struct TestDaemon {
    pub socket_path: PathBuf,
    pub pid_file: PathBuf,
    pub player: ScriptedPlayer,
    shutdown: ShutdownFlag,
    handle: Option<JoinHandle<Result<(), DaemonError>>>,
    temp_dir: TempDir,
}

impl TestDaemon {
    /// Start a daemon configured by `configure`, applied to a builder whose
    /// socket and PID file already point into the fixture's temp directory.
    ///
    /// Clips "play" through a [`ScriptedPlayer`] for `clip_duration`.
    pub async fn start_with(
        configure: impl FnOnce(TestConfigBuilder) -> TestConfigBuilder,
        clip_duration: Duration,
    ) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = configure(TestConfigBuilder::in_dir(temp_dir.path())).build();
        let player = ScriptedPlayer::new(temp_dir.path().join("player.log"), clip_duration);
        Self::spawn(config, player, temp_dir).await
    }

    /// Start a daemon with default admission settings.
    pub async fn start() -> Self {
        Self::start_with(|b| b, Duration::from_millis(10)).await
    }

    async fn spawn(config: AppConfig, player: ScriptedPlayer, temp_dir: TempDir) -> Self {
        let daemon = Daemon::new(&config).with_player(Arc::new(player.clone()));
        let socket_path = daemon.socket_path().to_path_buf();
        let pid_file = daemon.pid_file().to_path_buf();
        let shutdown = daemon.shutdown_flag();
        let handle = tokio::spawn(async move { daemon.run().await });

        let fixture = Self {
            socket_path,
            pid_file,
            player,
            shutdown,
            handle: Some(handle),
            temp_dir,
        };
        launcher::wait_until_ready(&fixture.client(), READY_TIMEOUT)
            .await
            .expect("test daemon did not start");
        fixture
    }

    /// A client for this daemon with the default timeout.
    pub fn client(&self) -> IpcClient {
        IpcClient::new(&self.socket_path)
    }

    /// The fixture's scratch directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create an (empty) clip file named `name` in the scratch directory.
    pub fn clip(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, b"").expect("failed to write clip");
        path
    }

    /// Raise the shutdown flag and wait for `run` to return.
    pub async fn stop(mut self) -> Result<(), DaemonError> {
        self.shutdown.request();
        self.join().await
    }

    /// Wait for `run` to return after a shutdown was requested elsewhere.
    pub async fn join(&mut self) -> Result<(), DaemonError> {
        let handle = self.handle.take().expect("daemon already joined");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("daemon did not stop in time")
            .expect("daemon task panicked")
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.shutdown.request();
    }
}
