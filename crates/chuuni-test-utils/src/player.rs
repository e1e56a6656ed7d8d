//! A stand-in audio player for tests.
//!
//! [`ScriptedPlayer`] resolves every clip to a tiny `sh` script that appends
//! `start <clip>` to a log, sleeps, then appends `end <clip>`. Reading the
//! log back shows exactly how playbacks were ordered and whether any of
//! them overlapped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chuuni_core::player::{PlayerCommand, PlayerResolver};

const SCRIPT: &str = r#"echo "start $1" >> "$0"; sleep "$2"; echo "end $1" >> "$0""#;

/// Player resolver that records each playback to a log file.
#[derive(Debug, Clone)]
pub struct ScriptedPlayer {
    log: PathBuf,
    duration: Duration,
}

impl ScriptedPlayer {
    /// Record into `log`; each clip "plays" for `duration`.
    pub fn new(log: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            log: log.into(),
            duration,
        }
    }

    /// Lines written so far, e.g. `["start /a.mp3", "end /a.mp3"]`.
    pub fn lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl PlayerResolver for ScriptedPlayer {
    fn resolve(&self, path: &Path, _volume: f64) -> Option<PlayerCommand> {
        Some(PlayerCommand::new(
            "sh",
            vec![
                "-c".to_string(),
                SCRIPT.to_string(),
                self.log.display().to_string(),
                path.display().to_string(),
                format!("{:.3}", self.duration.as_secs_f64()),
            ],
        ))
    }
}
