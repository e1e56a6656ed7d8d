//! Daemon IPC: Unix domain socket transport for the CLI and hooks.
//!
//! One connection carries one request line and one response line.
//!
//! ```text
//! ┌──────────┐        Unix socket         ┌──────────────┐
//! │   CLI    │───────────────────────────▶│  IPC Server  │
//! │  hooks   │  one JSON line each way    │  (handler)   │
//! └──────────┘                            └──────┬───────┘
//!                                                │
//!                                  ┌─────────────▼─────────────┐
//!                                  │ AdmissionController ──▶   │
//!                                  │ PlaybackQueue ──▶ worker  │
//!                                  └───────────────────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{IpcClient, IpcClientError};
pub use server::IpcState;
pub use types::*;
