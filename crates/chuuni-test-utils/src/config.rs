//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values whose
//! runtime files live in a caller-owned directory.

use std::path::Path;

use chuuni_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let dir = tempfile::tempdir().unwrap();
/// let config = TestConfigBuilder::in_dir(dir.path())
///     .cooldown_seconds(0.0)
///     .session_limit("coding", 2)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Defaults, with socket and PID file placed inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new()
            .socket_path(&dir.join("chuuni.sock"))
            .pid_file(&dir.join("chuuni.pid"))
    }

    pub fn socket_path(mut self, path: &Path) -> Self {
        self.config.daemon.socket_path = Some(path.display().to_string());
        self
    }

    pub fn pid_file(mut self, path: &Path) -> Self {
        self.config.daemon.pid_file = Some(path.display().to_string());
        self
    }

    pub fn cooldown_seconds(mut self, secs: f64) -> Self {
        self.config.playback.cooldown_seconds = secs;
        self
    }

    pub fn cooldown(mut self, event: &str, secs: f64) -> Self {
        self.config.cooldowns.insert(event.to_string(), secs);
        self
    }

    pub fn session_limit(mut self, event: &str, limit: u32) -> Self {
        self.config.session_limits.insert(event.to_string(), limit);
        self
    }

    pub fn repeat_probability(mut self, probability: f64) -> Self {
        self.config.playback.repeat_probability = probability;
        self
    }

    pub fn character_dir(mut self, dir: &Path) -> Self {
        self.config.character.dir = Some(dir.display().to_string());
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
