//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Parses arbitrary text as a config and, when it validates, builds the
//! admission policy from it. Neither step may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = chuuni_config::AppConfig::parse(s) {
            let policy = config.build_admission_policy();
            let _ = policy.cooldown_for("coding");
            let _ = config.socket_path();
        }
    }
});
