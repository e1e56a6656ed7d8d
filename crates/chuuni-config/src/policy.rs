//! Admission policy parameters.
//!
//! An [`AdmissionPolicy`] bundles the three knobs the daemon's admission
//! controller consults for every play request: a per-event cooldown, a
//! per-event session limit, and a global repeat-probability. It is built
//! once at daemon start (usually via
//! [`AppConfig::build_admission_policy`](crate::AppConfig::build_admission_policy))
//! and never mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Built-in per-event session limits, applied beneath any configured values.
///
/// `0` means unlimited.
pub const DEFAULT_SESSION_LIMITS: &[(&str, u32)] = &[
    ("coding", 3),
    ("bash_run", 3),
    ("thinking", 1),
    ("permission_prompt", 2),
    ("task_start", 5),
    ("task_done", 1),
    ("test_pass", 5),
    ("test_fail", 5),
    ("error", 5),
];

/// Default cooldown for events without an explicit entry.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Default chance that a repeat play of an event goes through.
pub const DEFAULT_REPEAT_PROBABILITY: f64 = 0.5;

/// Immutable admission parameters for the lifetime of a daemon process.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionPolicy {
    default_cooldown: Duration,
    cooldowns: HashMap<String, Duration>,
    session_limits: BTreeMap<String, u32>,
    repeat_probability: f64,
}

impl AdmissionPolicy {
    /// Create a policy with the given default cooldown, no session limits,
    /// and the default repeat-probability.
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            default_cooldown,
            cooldowns: HashMap::new(),
            session_limits: BTreeMap::new(),
            repeat_probability: DEFAULT_REPEAT_PROBABILITY,
        }
    }

    /// Override the cooldown for a single event.
    pub fn with_cooldown(mut self, event: &str, cooldown: Duration) -> Self {
        self.cooldowns.insert(event.to_string(), cooldown);
        self
    }

    /// Cap the number of accepted plays of `event` per session (0 = unlimited).
    pub fn with_session_limit(mut self, event: &str, limit: u32) -> Self {
        self.session_limits.insert(event.to_string(), limit);
        self
    }

    /// Set the repeat-probability. Values outside `[0, 1]` are clamped and
    /// NaN is treated as `0`.
    pub fn with_repeat_probability(mut self, probability: f64) -> Self {
        self.repeat_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    /// Cooldown that applies to `event`.
    pub fn cooldown_for(&self, event: &str) -> Duration {
        self.cooldowns
            .get(event)
            .copied()
            .unwrap_or(self.default_cooldown)
    }

    /// Session limit for `event`; `0` when unlimited or unconfigured.
    pub fn session_limit_for(&self, event: &str) -> u32 {
        self.session_limits.get(event).copied().unwrap_or(0)
    }

    /// All configured session limits, as reported by the `status` request.
    pub fn session_limits(&self) -> &BTreeMap<String, u32> {
        &self.session_limits
    }

    pub fn repeat_probability(&self) -> f64 {
        self.repeat_probability
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Merge `overrides` on top of [`DEFAULT_SESSION_LIMITS`].
///
/// Keys that are not built-in events pass through, so custom character
/// events can be limited as well.
pub fn merged_session_limits(overrides: &BTreeMap<String, u32>) -> BTreeMap<String, u32> {
    let mut merged: BTreeMap<String, u32> = DEFAULT_SESSION_LIMITS
        .iter()
        .map(|(event, limit)| (event.to_string(), *limit))
        .collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}
