//! Real-time collaboration constants and WebSocket message protocol.
//!
//! Lives in `core` so the API's socket dispatcher, its REST handlers (which
//! also broadcast parameter changes), and tests all share one definition of
//! the wire format. Messages are JSON objects with a `"type"` discriminator.

use serde::{Deserialize, Serialize};

use crate::types::DbId;
use crate::universe::ParameterKind;

// ---------------------------------------------------------------------------
// Heartbeat constants
// ---------------------------------------------------------------------------

/// Interval between server Ping frames (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Connections silent for longer than this are pruned.
pub const HEARTBEAT_TIMEOUT_SECS: i64 = 90;

// ---------------------------------------------------------------------------
// Error codes (socket-only; HTTP-shared codes come from `CoreError::code`)
// ---------------------------------------------------------------------------

pub mod error_codes {
    /// Frame could not be parsed as a client message.
    pub const BAD_MESSAGE: &str = "BAD_MESSAGE";
    /// The connection has not joined the universe room it addressed.
    pub const NOT_IN_ROOM: &str = "NOT_IN_ROOM";
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A 2D cursor position in universe view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        universe_id: DbId,
    },
    Leave {
        universe_id: DbId,
    },
    ParameterUpdate {
        universe_id: DbId,
        kind: ParameterKind,
        /// Raw patch object; decoded per `kind` by the dispatcher.
        parameters: serde_json::Value,
    },
    CursorUpdate {
        universe_id: DbId,
        position: CursorPosition,
    },
    Heartbeat {
        #[serde(default)]
        universe_id: Option<DbId>,
    },
}

/// A user currently present in a universe room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMember {
    pub user_id: DbId,
    /// RFC 3339 timestamp of when the connection was established.
    pub connected_at: String,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    JoinResponse {
        universe_id: DbId,
        status: String,
        members: Vec<RoomMember>,
    },
    UserJoined {
        universe_id: DbId,
        user_id: DbId,
    },
    LeaveResponse {
        universe_id: DbId,
        status: String,
    },
    UserLeft {
        universe_id: DbId,
        user_id: DbId,
    },
    ParametersUpdated {
        universe_id: DbId,
        kind: ParameterKind,
        parameters: serde_json::Value,
        updated_by: DbId,
    },
    CursorUpdated {
        universe_id: DbId,
        user_id: DbId,
        position: CursorPosition,
    },
    HeartbeatResponse {
        timestamp: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        // Every variant holds only JSON-representable data.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","code":"INTERNAL_ERROR","message":"serialization failed"}"#
                .to_string()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
