//! Fuzz target for the socket request decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_request_decode
//!
//! Every input must either decode or map to a rejection reason; decoded
//! requests must re-encode as a single newline-terminated line.

#![no_main]

use chuuni_core::ipc::{Request, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match Request::decode(data) {
        Ok(request) => {
            if let Ok(line) = request.encode() {
                assert_eq!(line.last(), Some(&b'\n'));
                assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
            }
        }
        Err(err) => {
            let response = Response::from(err);
            assert!(!response.ok);
            assert!(response.reason.is_some());
        }
    }
});
