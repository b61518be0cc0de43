//! Error types for the chat rooms
//!
//! Defines fatal application errors, typed room errors returned to callers,
//! and subscriber send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level (fatal) errors
///
/// These terminate a connection or stop the server from starting.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Room operation errors
///
/// Ordinary, expected outcomes of room operations. Callers decide how to
/// present them; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Room id and password do not match a live room
    #[error("Room ID or password is incorrect")]
    AccessDenied,

    /// Display name already used in the room
    #[error("Username '{0}' is already in use in this room")]
    UsernameTaken(String),

    /// No live room with the given code
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Member id is not (or no longer) in the room
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Blank or malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// No free room code after the configured number of attempts
    #[error("Could not allocate a unique room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// `add_admin` called on an already seeded room
    #[error("Room already has an admin")]
    AlreadySeeded,
}

/// Broken per-room invariant
///
/// A programming defect, never returned to end users. The session logs it
/// and tears the room down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Room invariant violated: {0}")]
pub struct InvariantViolation(pub &'static str);

/// Subscriber send errors
///
/// Occurs when pushing an event to a subscriber whose stream was dropped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
