//! The `play` path shared by `chuuni play` and `chuuni on-hook`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chuuni_config::AppConfig;
use chuuni_core::player::{PlayerResolver, SystemPlayer};
use chuuni_core::{ChuuniEvent, IpcClient, Launcher, Response, character};
use tracing::{debug, warn};

/// What happened to one play attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The daemon admitted the clip.
    Queued(PathBuf),
    /// The daemon turned the request away.
    Rejected(Response),
    /// No daemon was reachable; the player was started directly.
    PlayedDirect(PathBuf),
    /// The character has no clip for this event.
    NoAudio { event: ChuuniEvent, dir: PathBuf },
    /// No daemon and no usable player.
    Silent,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Queued(path) => write!(f, "♪  {}", file_name(path)),
            Outcome::PlayedDirect(path) => write!(f, "♪  {} (direct)", file_name(path)),
            Outcome::Rejected(resp) => {
                let reason = resp.reason.as_deref().unwrap_or("rejected");
                match (resp.count, resp.limit) {
                    (Some(count), Some(limit)) => write!(f, "skipped ({reason} {count}/{limit})"),
                    _ => write!(f, "skipped ({reason})"),
                }
            }
            Outcome::NoAudio { event, dir } => {
                write!(f, "no audio file: drop {event}.mp3 into {}", dir.display())
            }
            Outcome::Silent => f.write_str("no audio player available"),
        }
    }
}

/// The `[event]  line` header printed before the outcome.
pub fn banner(event: ChuuniEvent) -> String {
    format!("[{event}]  {}", event.line())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Resolve a clip for `event`, make sure a daemon is up, and ask it to play.
pub async fn play_event(
    config_path: &Path,
    config: &AppConfig,
    event: ChuuniEvent,
) -> Result<Outcome> {
    let dir = config.character_dir();
    let Some(audio) = character::resolve(&dir, event.as_str()) else {
        return Ok(Outcome::NoAudio { event, dir });
    };

    let client = IpcClient::new(config.socket_path());
    let exe = std::env::current_exe().context("cannot locate the chuuni executable")?;
    let launcher = Launcher::new(exe, config_path, client.clone());
    if let Err(e) = launcher.ensure_running().await {
        warn!(error = %e, "could not start the daemon");
    }

    send_play(&client, event, audio, config.playback.volume, &SystemPlayer).await
}

/// Send a play request, falling back to `fallback` if no daemon answers.
pub async fn send_play(
    client: &IpcClient,
    event: ChuuniEvent,
    audio: PathBuf,
    volume: f64,
    fallback: &dyn PlayerResolver,
) -> Result<Outcome> {
    match client.play(event.as_str(), &audio, volume).await {
        Ok(resp) if resp.ok => Ok(Outcome::Queued(audio)),
        Ok(resp) => Ok(Outcome::Rejected(resp)),
        Err(e) if e.is_unreachable() => {
            debug!(error = %e, "daemon unreachable, playing directly");
            let Some(command) = fallback.resolve(&audio, volume) else {
                return Ok(Outcome::Silent);
            };
            command
                .spawn_detached()
                .with_context(|| format!("failed to start {}", command.program))?;
            Ok(Outcome::PlayedDirect(audio))
        }
        Err(e) => Err(e).context("daemon sent an unexpected reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chuuni_core::player::PlayerCommand;
    use chuuni_test_utils::daemon::TestDaemon;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct NoPlayer;

    impl PlayerResolver for NoPlayer {
        fn resolve(&self, _path: &Path, _volume: f64) -> Option<PlayerCommand> {
            None
        }
    }

    struct TruePlayer;

    impl PlayerResolver for TruePlayer {
        fn resolve(&self, _path: &Path, _volume: f64) -> Option<PlayerCommand> {
            Some(PlayerCommand::new("true", vec![]))
        }
    }

    #[test]
    fn test_outcome_display() {
        let queued = Outcome::Queued(PathBuf::from("/c/coding_1.mp3"));
        assert_eq!(queued.to_string(), "♪  coding_1.mp3");

        let limited = Outcome::Rejected(Response {
            count: Some(3),
            limit: Some(3),
            ..Response::rejected("session_limit")
        });
        assert_eq!(limited.to_string(), "skipped (session_limit 3/3)");

        let cooldown = Outcome::Rejected(Response::rejected("cooldown"));
        assert_eq!(cooldown.to_string(), "skipped (cooldown)");
    }

    #[test]
    fn test_banner_carries_a_builtin_line() {
        let header = banner(ChuuniEvent::TestPass);
        let line = header.strip_prefix("[test_pass]  ").unwrap();
        assert!(ChuuniEvent::TestPass.lines().contains(&line));
    }

    #[tokio::test]
    async fn test_send_play_through_daemon() {
        let daemon = TestDaemon::start_with(
            |b| b.cooldown_seconds(60.0).repeat_probability(1.0),
            Duration::from_millis(10),
        )
        .await;
        let client = daemon.client();
        let clip = daemon.clip("coding.mp3");

        let first = send_play(&client, ChuuniEvent::Coding, clip.clone(), 0.8, &NoPlayer)
            .await
            .unwrap();
        assert_eq!(first, Outcome::Queued(clip.clone()));

        let second = send_play(&client, ChuuniEvent::Coding, clip, 0.8, &NoPlayer)
            .await
            .unwrap();
        assert_eq!(second.to_string(), "skipped (cooldown)");

        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_play_falls_back_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let client = IpcClient::new(dir.path().join("missing.sock"));
        let clip = dir.path().join("coding.mp3");

        let outcome = send_play(&client, ChuuniEvent::Coding, clip.clone(), 0.8, &TruePlayer)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::PlayedDirect(clip.clone()));

        let outcome = send_play(&client, ChuuniEvent::Coding, clip, 0.8, &NoPlayer)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Silent);
    }

    #[tokio::test]
    async fn test_play_event_without_clip() {
        let dir = tempfile::tempdir().unwrap();
        let config = chuuni_test_utils::config::TestConfigBuilder::in_dir(dir.path())
            .character_dir(&dir.path().join("empty-character"))
            .build();

        let outcome = play_event(&dir.path().join("config.toml"), &config, ChuuniEvent::Error)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::NoAudio { event: ChuuniEvent::Error, .. }));
    }
}
