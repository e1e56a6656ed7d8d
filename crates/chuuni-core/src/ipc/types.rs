//! Wire types for the daemon socket protocol.
//!
//! Every request and every response is a single JSON object terminated by a
//! newline. Both the connection handler (daemon) and [`IpcClient`]
//! (CLI, hooks) use these types.
//!
//! [`IpcClient`]: super::IpcClient

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::admission::{Admission, Rejection};

/// Volume used when a `play` request omits it.
pub const DEFAULT_VOLUME: f64 = 0.8;

/// Largest request the daemon will read, newline included.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// A client request. The set of kinds is closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Play(PlayRequest),
    Status,
    SessionReset,
    Stop,
}

/// Payload of a `play` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    pub event: String,

    /// Empty means "bookkeeping only": admission runs, nothing is queued.
    #[serde(default)]
    pub audio_path: String,

    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    DEFAULT_VOLUME
}

/// Reasons a raw message could not be turned into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("bad JSON")]
    BadJson,

    #[error("message exceeds {} bytes", MAX_MESSAGE_BYTES)]
    TooLarge,

    #[error("unknown type: {0}")]
    UnknownType(String),
}

impl ProtocolError {
    /// The `reason` string sent back to the client.
    pub fn reason(&self) -> String {
        match self {
            ProtocolError::BadJson | ProtocolError::TooLarge => "bad JSON".to_string(),
            ProtocolError::UnknownType(_) => self.to_string(),
        }
    }
}

impl Request {
    /// Build a `play` request.
    pub fn play(event: &str, audio_path: &str, volume: f64) -> Self {
        Request::Play(PlayRequest {
            event: event.to_string(),
            audio_path: audio_path.to_string(),
            volume,
        })
    }

    /// Decode one message (without or with its trailing newline).
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::TooLarge);
        }
        let value: Value = serde_json::from_slice(raw).map_err(|_| ProtocolError::BadJson)?;
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::BadJson);
        };

        let kind = fields.remove("type").unwrap_or(Value::Null);
        match kind.as_str() {
            Some("play") => decode_play(fields).map(Request::Play),
            Some("status") => Ok(Request::Status),
            Some("session_reset") => Ok(Request::SessionReset),
            Some("stop") => Ok(Request::Stop),
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
            None => Err(ProtocolError::UnknownType(kind.to_string())),
        }
    }

    /// Encode as a newline-terminated JSON line.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        encode_line(self)
    }
}

fn decode_play(fields: Map<String, Value>) -> Result<PlayRequest, ProtocolError> {
    serde_json::from_value(Value::Object(fields)).map_err(|_| ProtocolError::BadJson)
}

fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

/// A daemon response. Only the fields relevant to the outcome are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_counts: Option<BTreeMap<String, u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_limits: Option<BTreeMap<String, u32>>,
}

impl Response {
    /// `{"ok": true}`
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    /// `{"ok": false, "reason": <reason>}`
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Reply to a `status` request.
    pub fn status(
        queue_size: usize,
        session_counts: BTreeMap<String, u32>,
        session_limits: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            ok: true,
            queue_size: Some(queue_size),
            session_counts: Some(session_counts),
            session_limits: Some(session_limits),
            ..Self::default()
        }
    }

    /// Encode as a newline-terminated JSON line.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        encode_line(self)
    }
}

impl From<&Rejection> for Response {
    fn from(rejection: &Rejection) -> Self {
        let mut response = Response::rejected(rejection.reason());
        if let Rejection::SessionLimit { count, limit } = rejection {
            response.count = Some(*count);
            response.limit = Some(*limit);
        }
        response
    }
}

impl From<Admission> for Response {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Accepted { .. } => Response::ok(),
            Admission::Rejected(rejection) => Response::from(&rejection),
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Response::rejected(err.reason())
    }
}
