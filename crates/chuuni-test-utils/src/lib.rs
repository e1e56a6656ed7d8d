#![deny(unsafe_code)]

//! Shared test utilities for the chuuni workspace.
//!
//! Provides a config builder, an in-process daemon fixture and a scripted audio
//! player, so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! chuuni-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod player;
