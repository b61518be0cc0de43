//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::RoomError;
use crate::event::RoomEvent;
use crate::member::Member;
use crate::room::{LeaveOutcome, Message, RoomSnapshot, RoomSummary};
use crate::types::RoomCode;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room and become its admin
    CreateRoom {
        room_name: String,
        password: String,
        admin_name: String,
    },
    /// Check a room id and password without joining
    ValidateAccess { room_id: String, password: String },
    /// Join an existing room
    JoinRoom {
        room_id: String,
        password: String,
        username: String,
    },
    /// Leave the current room (the admin leaving deletes it)
    LeaveRoom,
    /// Send a chat message to the current room
    PostMessage {
        body: String,
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful
    Connected { connection_id: String },
    /// Room created; the sender is its admin
    RoomCreated { room_id: RoomCode, member: Member },
    /// Result of an access check (`null` room on mismatch)
    AccessChecked { room: Option<RoomSummary> },
    /// Joined a room, with its current state
    RoomJoined { member: Member, snapshot: RoomSnapshot },
    /// Left the current room
    RoomLeft { outcome: LeaveOutcome },
    /// Own message recorded
    MessageAccepted { message: Message },
    /// Event from the current room
    Event { event: RoomEvent },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room id or password incorrect
    AccessDenied,
    /// Display name in use
    UsernameTaken,
    /// Non-existent or deleted room
    RoomNotFound,
    /// Not (or no longer) a member
    MemberNotFound,
    /// Blank field
    InvalidInput,
    /// Attempted room action without joining a room
    NotInRoom,
    /// Already in a room
    AlreadyInRoom,
    /// Server could not allocate a room
    Unavailable,
    /// Invalid message format
    InvalidMessage,
}

/// Convert RoomError to ServerMessage for client notification
impl From<RoomError> for ServerMessage {
    fn from(err: RoomError) -> Self {
        let code = match &err {
            RoomError::AccessDenied => ErrorCode::AccessDenied,
            RoomError::UsernameTaken(_) => ErrorCode::UsernameTaken,
            RoomError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            RoomError::MemberNotFound(_) => ErrorCode::MemberNotFound,
            RoomError::InvalidInput(_) => ErrorCode::InvalidInput,
            RoomError::CodeSpaceExhausted(_) | RoomError::AlreadySeeded => ErrorCode::Unavailable,
        };
        ServerMessage::error(code, err.to_string())
    }
}
