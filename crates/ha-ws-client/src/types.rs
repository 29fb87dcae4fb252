//! Wire message types for the test protocol
//!
//! Client-side view of the JSON envelope spoken by Home-Assistant-compatible
//! servers: handshake frames, command results, subscription events, pong.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

// =============================================================================
// Server Messages
// =============================================================================

/// Incoming WebSocket message from the server
///
/// Unknown `type` values decode as [`ServerMessage::Unknown`] and unknown
/// fields inside known kinds are ignored, so the client survives servers
/// that speak a newer dialect.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result(CommandResult),
    Event(EventMessage),
    Pong {
        id: u64,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Request or subscription id carried by the frame, if any
    pub fn id(&self) -> Option<u64> {
        match self {
            ServerMessage::Result(result) => Some(result.id),
            ServerMessage::Event(event) => Some(event.id),
            ServerMessage::Pong { id } => Some(*id),
            _ => None,
        }
    }
}

/// Decoded `result` frame
///
/// Handed back to callers verbatim: `success: false` is data for the test to
/// assert against, not a client error.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl CommandResult {
    /// Result payload, `null` when the server sent none
    pub fn into_result(self) -> Value {
        self.result.unwrap_or(Value::Null)
    }
}

/// Error payload of an unsuccessful `result`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Decoded `event` frame: the subscription id it was delivered for plus the
/// event payload
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    pub event: EventPayload,
}

/// Event body as delivered to a subscription
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub time_fired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub context: Value,
}

// =============================================================================
// Client Frames
// =============================================================================

/// Handshake reply carrying the bearer token
pub(crate) fn auth_frame(token: &str) -> Value {
    json!({
        "type": "auth",
        "access_token": token,
    })
}
