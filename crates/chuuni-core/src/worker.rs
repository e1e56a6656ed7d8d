//! The playback worker: one task, one clip at a time.
//!
//! The worker waits for each player process to exit before taking the next
//! task, so at most one clip is audible at any instant no matter how many
//! requests were admitted concurrently. Playback failures are logged and
//! the loop carries on.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::player::PlayerResolver;
use crate::queue::{PlaybackQueue, PlaybackTask};

/// Why a single task produced no sound.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio file not found: {0}")]
    MissingFile(PathBuf),

    #[error("no suitable audio player found")]
    NoPlayer,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// Start the worker loop on the current runtime.
pub fn spawn(queue: Arc<PlaybackQueue>, player: Arc<dyn PlayerResolver>) -> JoinHandle<()> {
    tokio::spawn(run(queue, player))
}

/// Drain `queue` forever, playing each task to completion.
pub async fn run(queue: Arc<PlaybackQueue>, player: Arc<dyn PlayerResolver>) {
    info!("playback worker started");
    loop {
        let task = queue.dequeue().await;
        match play(&task, player.as_ref()).await {
            Ok(()) => debug!(path = %task.path.display(), "playback finished"),
            Err(PlaybackError::MissingFile(path)) => {
                debug!(path = %path.display(), "audio file not found, skipping");
            }
            Err(PlaybackError::NoPlayer) => debug!("no suitable player found, skipping"),
            Err(e) => warn!(error = %e, path = %task.path.display(), "playback failed"),
        }
    }
}

/// Play one task and wait for the player to exit.
pub async fn play(task: &PlaybackTask, player: &dyn PlayerResolver) -> Result<(), PlaybackError> {
    if !tokio::fs::try_exists(&task.path).await.unwrap_or(false) {
        return Err(PlaybackError::MissingFile(task.path.clone()));
    }
    let command = player
        .resolve(&task.path, task.volume)
        .ok_or(PlaybackError::NoPlayer)?;

    let mut child = command
        .to_tokio_command()
        .spawn()
        .map_err(|source| PlaybackError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let status = child.wait().await.map_err(|source| PlaybackError::Wait {
        program: command.program.clone(),
        source,
    })?;
    if !status.success() {
        debug!(program = %command.program, %status, "player exited unsuccessfully");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerCommand;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedPlayer(Option<PlayerCommand>);

    impl PlayerResolver for FixedPlayer {
        fn resolve(&self, _path: &Path, _volume: f64) -> Option<PlayerCommand> {
            self.0.clone()
        }
    }

    fn clip(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("coding.mp3");
        std::fs::write(&path, b"fake").unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_file() {
        let task = PlaybackTask::new("/nonexistent/clip.mp3", 0.8);
        let player = FixedPlayer(Some(PlayerCommand::new("true", vec![])));
        let err = play(&task, &player).await.unwrap_err();
        assert!(matches!(err, PlaybackError::MissingFile(_)));
    }

    #[tokio::test]
    async fn test_no_player() {
        let dir = TempDir::new().unwrap();
        let task = PlaybackTask::new(clip(&dir), 0.8);
        let err = play(&task, &FixedPlayer(None)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoPlayer));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let task = PlaybackTask::new(clip(&dir), 0.8);
        let player = FixedPlayer(Some(PlayerCommand::new(
            "/nonexistent/player-binary",
            vec![],
        )));
        let err = play(&task, &player).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_waits_for_player_exit() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("done");
        let task = PlaybackTask::new(clip(&dir), 0.8);
        let player = FixedPlayer(Some(PlayerCommand::new(
            "sh",
            vec![
                "-c".to_string(),
                format!("sleep 0.1; touch {}", marker.display()),
            ],
        )));

        play(&task, &player).await.unwrap();
        assert!(marker.exists(), "play() returned before the player exited");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_survives_failures() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("played");
        let good = clip(&dir);
        let queue = Arc::new(PlaybackQueue::default());
        let player: Arc<dyn PlayerResolver> = Arc::new(FixedPlayer(Some(PlayerCommand::new(
            "sh",
            vec!["-c".to_string(), format!("touch {}", marker.display())],
        ))));

        queue.enqueue(PlaybackTask::new("/nonexistent/a.mp3", 0.8));
        queue.enqueue(PlaybackTask::new(good, 0.8));
        let handle = spawn(Arc::clone(&queue), player);

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
        assert!(!handle.is_finished());
        handle.abort();
    }
}
