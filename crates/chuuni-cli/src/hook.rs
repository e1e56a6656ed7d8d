//! Hook payload dispatch for `chuuni on-hook <CTX>`.
//!
//! Editor hooks pipe a JSON document on stdin. Only the context name and a
//! few well-known fields decide which event, if any, to play.

use chuuni_core::ChuuniEvent;
use serde_json::Value;

/// Parse a hook payload; blank or malformed input becomes an empty object.
pub fn parse_payload(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "unparseable hook payload, ignoring fields");
        Value::Object(Default::default())
    })
}

/// Map a hook context and its payload to the event to play.
pub fn dispatch(ctx: &str, payload: &Value) -> Option<ChuuniEvent> {
    match ctx {
        "post-bash" => Some(if exit_code(payload) == 0 {
            ChuuniEvent::TestPass
        } else {
            ChuuniEvent::TestFail
        }),
        _ => None,
    }
}

/// First non-zero of `tool_response.exit_code` and `exit_code`, else 0.
fn exit_code(payload: &Value) -> i64 {
    [
        payload.pointer("/tool_response/exit_code"),
        payload.get("exit_code"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_i64)
    .find(|code| *code != 0)
    .unwrap_or(0)
}
