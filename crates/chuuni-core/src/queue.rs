//! Bounded drop-oldest playback queue.
//!
//! Producers (connection handlers) never block: once the queue holds
//! [`QUEUE_CAPACITY`] tasks, enqueuing evicts the oldest pending task first.
//! The single consumer (the playback worker) suspends in
//! [`PlaybackQueue::dequeue`] until a task is available.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::Notify;

/// Maximum number of pending playback tasks.
pub const QUEUE_CAPACITY: usize = 8;

/// An admitted clip waiting for its turn on the speakers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTask {
    pub path: PathBuf,
    /// Player volume, clamped to `[0.0, 1.0]`.
    pub volume: f64,
}

impl PlaybackTask {
    pub fn new(path: impl Into<PathBuf>, volume: f64) -> Self {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        Self {
            path: path.into(),
            volume,
        }
    }
}

/// Thread-safe bounded FIFO shared by the connection handlers and the worker.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: Mutex<VecDeque<PlaybackTask>>,
    capacity: usize,
    ready: Notify,
}

impl PlaybackQueue {
    /// Create a queue holding at most `capacity` tasks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ready: Notify::new(),
        }
    }

    /// Append `task`, evicting and returning the oldest pending task if the
    /// queue was full.
    pub fn enqueue(&self, task: PlaybackTask) -> Option<PlaybackTask> {
        let evicted = {
            let mut items = self.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(task);
            evicted
        };
        self.ready.notify_one();
        evicted
    }

    /// Take the oldest task if one is pending.
    pub fn try_dequeue(&self) -> Option<PlaybackTask> {
        self.lock().pop_front()
    }

    /// Wait for and take the oldest task.
    pub async fn dequeue(&self) -> PlaybackTask {
        loop {
            if let Some(task) = self.try_dequeue() {
                return task;
            }
            // `notify_one` stores a permit when nobody is waiting, so an
            // enqueue between the check above and this await is not lost.
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PlaybackTask>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new(QUEUE_CAPACITY)
    }
}
