//! Platform audio-player resolution.
//!
//! chuuni never decodes audio itself. A [`PlayerResolver`] maps a clip and a
//! volume to the argv of an external player binary; the playback worker
//! spawns it and waits for it to exit.
//!
//! [`SystemPlayer`] is the production resolver:
//!
//! | platform | command |
//! |---|---|
//! | macOS | `afplay -v <volume> <file>` |
//! | Linux | first of `paplay`, `aplay`, `mpg123` found on `PATH` |
//! | other | none |

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// PulseAudio's 100% volume.
const PA_VOLUME_NORM: f64 = 65536.0;

/// A fully resolved player invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// An async command with all stdio discarded, ready to spawn.
    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Start the player and return without waiting for it.
    ///
    /// Used by clients that cannot reach the daemon; overlapping playback is
    /// possible on this path.
    pub fn spawn_detached(&self) -> std::io::Result<u32> {
        let child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(child.id())
    }
}

/// Maps `(file, volume)` to a player invocation, or `None` when no suitable
/// player exists on this host.
pub trait PlayerResolver: Send + Sync {
    fn resolve(&self, path: &Path, volume: f64) -> Option<PlayerCommand>;
}

/// Resolver backed by the host's own audio tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlayer;

impl PlayerResolver for SystemPlayer {
    fn resolve(&self, path: &Path, volume: f64) -> Option<PlayerCommand> {
        if cfg!(target_os = "macos") {
            Some(mac_command(path, volume))
        } else if cfg!(target_os = "linux") {
            linux_command(path, volume, |binary| find_on_path(binary).is_some())
        } else {
            tracing::debug!(os = env::consts::OS, "no audio player known for this platform");
            None
        }
    }
}

/// `afplay -v <volume> <file>`; afplay takes a linear 0.0–1.0 volume.
pub fn mac_command(path: &Path, volume: f64) -> PlayerCommand {
    PlayerCommand::new(
        "afplay",
        vec![
            "-v".to_string(),
            volume.to_string(),
            path.display().to_string(),
        ],
    )
}

/// Try `paplay`, `aplay`, then `mpg123`; `available` reports whether a
/// binary can be found.
pub fn linux_command(
    path: &Path,
    volume: f64,
    available: impl Fn(&str) -> bool,
) -> Option<PlayerCommand> {
    let file = path.display().to_string();

    if available("paplay") {
        // No amplification past 100%.
        let level = ((volume * PA_VOLUME_NORM) as u32).min(PA_VOLUME_NORM as u32);
        return Some(PlayerCommand::new(
            "paplay",
            vec![format!("--volume={level}"), file],
        ));
    }
    // aplay and mpg123 have no inline volume; the system mixer applies.
    for binary in ["aplay", "mpg123"] {
        if available(binary) {
            return Some(PlayerCommand::new(binary, vec!["-q".to_string(), file]));
        }
    }

    tracing::debug!("tried paplay, aplay, mpg123: none found in PATH");
    None
}

/// Locate an executable named `binary` on `PATH`.
pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
