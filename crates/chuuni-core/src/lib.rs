#![deny(unsafe_code)]

//! chuuni core runtime.
//!
//! The playback daemon and everything that talks to it: admission control,
//! the bounded playback queue, the serial playback worker, the Unix socket
//! protocol (server and client), daemon auto-start, and character audio
//! lookup. The `chuuni` CLI is a thin layer over this crate.

/// Per-event admission control (session limit, repeat roll, cooldown).
pub mod admission;
/// Character directory clip lookup.
pub mod character;
/// Daemon lifecycle: socket, PID marker, worker, accept loop.
pub mod daemon;
/// The closed set of hook events.
pub mod event;
/// Newline-delimited JSON over a Unix socket.
pub mod ipc;
/// Detached daemon auto-start and stop.
pub mod launcher;
/// Tracing subscriber setup.
pub mod logging;
/// External audio player resolution.
pub mod player;
/// Bounded drop-oldest playback queue.
pub mod queue;
/// Serial playback worker.
pub mod worker;

pub use admission::{Admission, AdmissionController, Rejection};
pub use daemon::{Daemon, DaemonError, ShutdownFlag};
pub use event::ChuuniEvent;
pub use ipc::{IpcClient, IpcClientError, Request, Response};
pub use launcher::{LaunchError, Launcher};
pub use player::{PlayerCommand, PlayerResolver, SystemPlayer};
pub use queue::{PlaybackQueue, PlaybackTask};
