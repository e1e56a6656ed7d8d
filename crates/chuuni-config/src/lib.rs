#![deny(unsafe_code)]

//! Configuration loading and validation for chuuni.
//!
//! Loads the TOML file at `~/.config/chuuni/config.toml` and validates it.
//! [`AppConfig`] is the central configuration structure; the [`policy`]
//! module turns its playback section into the daemon's immutable
//! [`AdmissionPolicy`](policy::AdmissionPolicy).

/// Admission policy parameters (cooldowns, session limits, repeat-probability).
pub mod policy;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// File name of the daemon's Unix socket inside [`config_dir`].
pub const SOCKET_FILE_NAME: &str = "chuuni.sock";
/// File name of the daemon's PID marker inside [`config_dir`].
pub const PID_FILE_NAME: &str = "chuuni.pid";
/// File name of the detached daemon's log inside [`config_dir`].
pub const LOG_FILE_NAME: &str = "daemon.log";
/// File name of the configuration file inside [`config_dir`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The per-user chuuni directory, `~/.config/chuuni`.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("chuuni")
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Directory holding one sub-directory per installed character.
pub fn characters_dir() -> PathBuf {
    config_dir().join("characters")
}

/// Expand a leading `~/` against the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(raw),
    }
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active character selection.
    #[serde(default)]
    pub character: CharacterConfig,

    /// Playback and admission defaults.
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Per-event cooldown overrides, in seconds.
    #[serde(default)]
    pub cooldowns: BTreeMap<String, f64>,

    /// Per-event session limits, merged over the built-in defaults.
    #[serde(default)]
    pub session_limits: BTreeMap<String, u32>,

    /// Daemon runtime paths.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which character's clips to play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    /// Name of a directory under `~/.config/chuuni/characters`.
    #[serde(default = "default_character")]
    pub active: String,

    /// Explicit audio directory; takes precedence over `active`.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            active: default_character(),
            dir: None,
        }
    }
}

fn default_character() -> String {
    "default".to_string()
}

/// Playback and admission defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Master switch; when false the CLI plays nothing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Player volume in `[0.0, 1.0]`.
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Cooldown in seconds for events without a `[cooldowns]` entry.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Chance in `[0.0, 1.0]` that a repeat play of an event is accepted.
    #[serde(default = "default_repeat_probability")]
    pub repeat_probability: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            volume: default_volume(),
            cooldown_seconds: default_cooldown_seconds(),
            repeat_probability: default_repeat_probability(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_volume() -> f64 {
    0.8
}

fn default_cooldown_seconds() -> f64 {
    policy::DEFAULT_COOLDOWN.as_secs_f64()
}

fn default_repeat_probability() -> f64 {
    policy::DEFAULT_REPEAT_PROBABILITY
}

/// Daemon runtime paths. Unset values resolve inside [`config_dir`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// PID marker written while the daemon runs.
    #[serde(default)]
    pub pid_file: Option<String>,

    /// Log file used when the daemon runs detached.
    #[serde(default)]
    pub log_file: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let volume = self.playback.volume;
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::Validation(format!(
                "playback.volume must be in [0.0, 1.0], got {volume}"
            )));
        }
        let probability = self.playback.repeat_probability;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::Validation(format!(
                "playback.repeat_probability must be in [0.0, 1.0], got {probability}"
            )));
        }
        let cooldown = self.playback.cooldown_seconds;
        if !cooldown.is_finite() || cooldown < 0.0 {
            return Err(ConfigError::Validation(format!(
                "playback.cooldown_seconds must be a non-negative number, got {cooldown}"
            )));
        }
        for (event, secs) in &self.cooldowns {
            if event.is_empty() {
                return Err(ConfigError::Validation(
                    "cooldowns keys must not be empty".to_string(),
                ));
            }
            if !secs.is_finite() || *secs < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "cooldowns.{event} must be a non-negative number, got {secs}"
                )));
            }
        }
        if self.session_limits.keys().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "session_limits keys must not be empty".to_string(),
            ));
        }
        if self.character.active.is_empty() && self.character.dir.is_none() {
            return Err(ConfigError::Validation(
                "character.active must not be empty".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// Build the daemon's [`AdmissionPolicy`](policy::AdmissionPolicy) from
    /// the playback, cooldown and session-limit sections.
    pub fn build_admission_policy(&self) -> policy::AdmissionPolicy {
        let mut admission = policy::AdmissionPolicy::new(seconds(self.playback.cooldown_seconds))
            .with_repeat_probability(self.playback.repeat_probability);

        for (event, secs) in &self.cooldowns {
            admission = admission.with_cooldown(event, seconds(*secs));
        }
        for (event, limit) in policy::merged_session_limits(&self.session_limits) {
            admission = admission.with_session_limit(&event, limit);
        }

        admission
    }

    /// Audio directory of the active character.
    pub fn character_dir(&self) -> PathBuf {
        match &self.character.dir {
            Some(dir) => expand_home(dir),
            None => characters_dir().join(&self.character.active),
        }
    }

    /// Resolved daemon socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| config_dir().join(SOCKET_FILE_NAME))
    }

    /// Resolved PID marker path.
    pub fn pid_file(&self) -> PathBuf {
        self.daemon
            .pid_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| config_dir().join(PID_FILE_NAME))
    }

    /// Resolved detached-daemon log path.
    pub fn log_file(&self) -> PathBuf {
        self.daemon
            .log_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| config_dir().join(LOG_FILE_NAME))
    }
}

/// Seconds to a [`Duration`]; validation has already rejected negatives.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.character.active, "default");
        assert!(config.playback.enabled);
        assert_eq!(config.playback.volume, 0.8);
        assert_eq!(config.playback.cooldown_seconds, 3.0);
        assert_eq!(config.playback.repeat_probability, 0.5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.playback.cooldown_seconds, 3.0);
        assert!(config.session_limits.is_empty());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [character]
            active = "genki-girl"

            [playback]
            enabled = false
            volume = 0.5
            cooldown_seconds = 2.0
            repeat_probability = 0.25

            [cooldowns]
            coding = 10.0

            [session_limits]
            coding = 4

            [daemon]
            socket_path = "/tmp/chuuni-test.sock"

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.character.active, "genki-girl");
        assert!(!config.playback.enabled);
        assert_eq!(config.playback.volume, 0.5);
        assert_eq!(config.cooldowns.get("coding"), Some(&10.0));
        assert_eq!(config.session_limits.get("coding"), Some(&4));
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/chuuni-test.sock"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_out_of_range_volume() {
        let toml = r#"
            [playback]
            volume = 1.5
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_probability() {
        let toml = r#"
            [playback]
            repeat_probability = -0.1
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_negative_cooldown() {
        let toml = r#"
            [cooldowns]
            coding = -1.0
        "#;
        assert!(AppConfig::parse(toml).is_err());

        let toml = r#"
            [playback]
            cooldown_seconds = -3.0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_negative_session_limit_type() {
        let toml = r#"
            [session_limits]
            coding = -2
        "#;
        // u32 cannot hold a negative value; this surfaces as a parse error.
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    // ── Admission policy ──────────────────────────────────────────────

    #[test]
    fn test_build_admission_policy() {
        let toml = r#"
            [playback]
            cooldown_seconds = 2.5
            repeat_probability = 0.0

            [cooldowns]
            coding = 10.0
            error = 0.0

            [session_limits]
            coding = 7
            custom = 2
        "#;
        let config = AppConfig::parse(toml).unwrap();
        let policy = config.build_admission_policy();

        assert_eq!(policy.cooldown_for("coding"), Duration::from_secs(10));
        assert_eq!(policy.cooldown_for("error"), Duration::ZERO);
        assert_eq!(policy.cooldown_for("bash_run"), Duration::from_millis(2500));
        assert_eq!(policy.session_limit_for("coding"), 7);
        assert_eq!(policy.session_limit_for("custom"), 2);
        // built-in default still present
        assert_eq!(policy.session_limit_for("task_done"), 1);
        assert_eq!(policy.repeat_probability(), 0.0);
    }

    // ── Paths ─────────────────────────────────────────────────────────

    #[test]
    fn test_default_paths_live_in_config_dir() {
        let config = AppConfig::default();
        assert_eq!(config.socket_path(), config_dir().join(SOCKET_FILE_NAME));
        assert_eq!(config.pid_file(), config_dir().join(PID_FILE_NAME));
        assert_eq!(config.log_file(), config_dir().join(LOG_FILE_NAME));
        assert_eq!(config.character_dir(), characters_dir().join("default"));
    }

    #[test]
    fn test_explicit_character_dir_wins() {
        let toml = r#"
            [character]
            active = "ignored"
            dir = "/srv/voices/custom"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.character_dir(), PathBuf::from("/srv/voices/custom"));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, b"[playback]\nvolume = 0.3\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.playback.volume, 0.3);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/config.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&tmp.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config.playback.volume, 0.8);
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
