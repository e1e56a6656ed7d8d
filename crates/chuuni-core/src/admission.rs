//! Admission control for play requests.
//!
//! Every play request passes three ordered checks against per-event state
//! held behind a single mutex:
//!
//! 1. **Session limit**: a hard cap on accepted plays per event.
//! 2. **Repeat probability**: after the first play, each repeat survives
//!    only with the configured probability.
//! 3. **Cooldown**: a minimum gap between two accepted plays of an event.
//!
//! Only a request that passes all three claims the slot (records the play
//! time and bumps the session count). Rejections never touch state, so a
//! skipped or cooled-down request neither consumes quota nor restarts the
//! cooldown clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chuuni_config::policy::AdmissionPolicy;
use tracing::debug;

use crate::queue::{PlaybackQueue, PlaybackTask};

/// Why a play request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The event already used up its session quota.
    SessionLimit { count: u32, limit: u32 },
    /// The repeat-probability roll failed.
    Skipped,
    /// The event was accepted too recently.
    Cooldown { remaining: Duration },
}

impl Rejection {
    /// Machine-readable reason sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::SessionLimit { .. } => "session_limit",
            Rejection::Skipped => "skipped",
            Rejection::Cooldown { .. } => "cooldown",
        }
    }
}

/// Outcome of [`AdmissionController::evaluate_play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Accepted; `enqueued` is false for an empty audio path.
    Accepted { enqueued: bool },
    Rejected(Rejection),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }
}

/// Per-event bookkeeping. Both fields are read and written together.
#[derive(Debug, Clone, Copy, Default)]
struct EventState {
    last_played_at: Option<Instant>,
    session_count: u32,
}

type Roll = Box<dyn Fn() -> f64 + Send + Sync>;

/// Decides which play requests reach the playback queue.
pub struct AdmissionController {
    policy: AdmissionPolicy,
    state: Mutex<HashMap<String, EventState>>,
    queue: Arc<PlaybackQueue>,
    roll: Roll,
}

impl AdmissionController {
    /// Create a controller feeding `queue`, rolling with the thread RNG.
    pub fn new(policy: AdmissionPolicy, queue: Arc<PlaybackQueue>) -> Self {
        Self {
            policy,
            state: Mutex::new(HashMap::new()),
            queue,
            roll: Box::new(rand::random::<f64>),
        }
    }

    /// Replace the random source. `roll` must return values in `[0, 1)`.
    pub fn with_roll(mut self, roll: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.roll = Box::new(roll);
        self
    }

    /// Admit or reject a play request, enqueuing `audio_path` when admitted
    /// and non-empty.
    pub fn evaluate_play(&self, event: &str, audio_path: &str, volume: f64) -> Admission {
        self.evaluate_play_at(event, audio_path, volume, Instant::now())
    }

    /// [`evaluate_play`](Self::evaluate_play) with an explicit clock reading.
    pub fn evaluate_play_at(
        &self,
        event: &str,
        audio_path: &str,
        volume: f64,
        now: Instant,
    ) -> Admission {
        if let Err(rejection) = self.claim(event, now) {
            debug!(event, reason = rejection.reason(), ?rejection, "play rejected");
            return Admission::Rejected(rejection);
        }

        // The admission lock is released by now; queue contention never
        // holds up other clients' admission decisions.
        let enqueued = !audio_path.is_empty();
        if enqueued {
            if let Some(evicted) = self.queue.enqueue(PlaybackTask::new(audio_path, volume)) {
                debug!(path = %evicted.path.display(), "queue full, dropped oldest task");
            }
            debug!(event, audio_path, "play enqueued");
        } else {
            debug!(event, "play accepted without audio");
        }
        Admission::Accepted { enqueued }
    }

    /// Run the three checks and, if all pass, record the play.
    fn claim(&self, event: &str, now: Instant) -> Result<(), Rejection> {
        let mut state = self.lock();
        let current = state.get(event).copied().unwrap_or_default();
        let count = current.session_count;

        let limit = self.policy.session_limit_for(event);
        if limit > 0 && count >= limit {
            return Err(Rejection::SessionLimit { count, limit });
        }

        if count > 0 && (self.roll)() >= self.policy.repeat_probability() {
            return Err(Rejection::Skipped);
        }

        let cooldown = self.policy.cooldown_for(event);
        if let Some(last) = current.last_played_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                return Err(Rejection::Cooldown {
                    remaining: cooldown - elapsed,
                });
            }
        }

        state.insert(
            event.to_string(),
            EventState {
                last_played_at: Some(now),
                session_count: count + 1,
            },
        );
        Ok(())
    }

    /// Forget all per-event state; the next play of any event is a first play.
    pub fn session_reset(&self) {
        self.lock().clear();
    }

    /// Accepted plays per event since start or the last reset.
    pub fn session_counts(&self) -> BTreeMap<String, u32> {
        self.lock()
            .iter()
            .map(|(event, s)| (event.clone(), s.session_count))
            .collect()
    }

    pub fn session_limits(&self) -> &BTreeMap<String, u32> {
        self.policy.session_limits()
    }

    /// Number of tasks waiting for the playback worker.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EventState>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("policy", &self.policy)
            .field("events", &self.lock().len())
            .field("queue_size", &self.queue.len())
            .finish()
    }
}
