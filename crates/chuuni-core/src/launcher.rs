//! Auto-start and stop of the background daemon.
//!
//! Hooks call [`ensure_running`] before sending a play request. If nothing
//! answers on the socket, the current executable is re-launched as
//! `<exe> --config <path> daemon run --log-to-file` in its own process group,
//! detached from the caller's stdio, and the socket is polled until the new
//! daemon answers.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, info};

use crate::ipc::IpcClient;

/// Gap between liveness probes while waiting on the daemon.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a freshly spawned daemon gets to start answering.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(3);

/// How long `stop_and_wait` waits for the socket to disappear.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors from launching or stopping the daemon.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn daemon {exe}: {source}")]
    Spawn {
        exe: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon did not become ready within {0:?}")]
    Timeout(Duration),

    #[error("daemon did not shut down within {0:?}")]
    StillRunning(Duration),
}

/// How to re-launch ourselves as a detached daemon.
#[derive(Debug, Clone)]
pub struct Launcher {
    exe: PathBuf,
    config_path: PathBuf,
    client: IpcClient,
    startup_timeout: Duration,
}

impl Launcher {
    pub fn new(exe: impl Into<PathBuf>, config_path: impl Into<PathBuf>, client: IpcClient) -> Self {
        Self {
            exe: exe.into(),
            config_path: config_path.into(),
            client,
            startup_timeout: STARTUP_TIMEOUT,
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Start the daemon unless one already answers.
    ///
    /// Returns `true` if a new daemon was spawned.
    pub async fn ensure_running(&self) -> Result<bool, LaunchError> {
        if self.client.is_running().await {
            return Ok(false);
        }
        let pid = self.spawn_detached()?;
        info!(pid, exe = %self.exe.display(), "spawned background daemon");
        wait_until_ready(&self.client, self.startup_timeout).await?;
        Ok(true)
    }

    /// Spawn `<exe> --config <path> daemon run --log-to-file` without waiting.
    pub fn spawn_detached(&self) -> Result<u32, LaunchError> {
        let mut command = std::process::Command::new(&self.exe);
        command
            .arg("--config")
            .arg(&self.config_path)
            .args(["daemon", "run", "--log-to-file"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Detach from the caller's process group.
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            exe: self.exe.clone(),
            source,
        })?;
        Ok(child.id())
    }
}

/// Poll until a daemon answers on `client`'s socket.
pub async fn wait_until_ready(client: &IpcClient, timeout: Duration) -> Result<(), LaunchError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if client.is_running().await {
            debug!("daemon ready");
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(LaunchError::Timeout(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Ask the daemon to stop and wait for its socket to disappear.
///
/// Returns `false` if no daemon was running.
pub async fn stop_and_wait(client: &IpcClient, timeout: Duration) -> Result<bool, LaunchError> {
    if client.stop().await.is_err() {
        return Ok(false);
    }
    let deadline = tokio::time::Instant::now() + timeout;
    while socket_present(client.socket_path()) {
        if tokio::time::Instant::now() >= deadline {
            return Err(LaunchError::StillRunning(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(true)
}

fn socket_present(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
