//! Basic type definitions for the chat rooms
//!
//! Provides newtype wrappers for type safety:
//! - `MemberId`: UUID-based member identifier, unique within a room
//! - `MessageId`: UUID-based message identifier
//! - `RoomCode`: 6-character uppercase alphanumeric room code

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of every generated room code
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Unique member identifier (newtype pattern)
///
/// Wraps a UUID v4. Implements Hash and Eq for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub Uuid);

impl MemberId {
    /// Create a new random member ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a member ID supplied by a client
    pub fn parse(input: &str) -> Option<Self> {
        Uuid::parse_str(input.trim()).ok().map(Self)
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room code (6-character uppercase alphanumeric)
///
/// Always stored upper-cased, so equality and hashing are case-insensitive
/// with respect to client input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Generate a new random 6-character room code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_CHARSET[rng.gen_range(0..ROOM_CODE_CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize a code supplied by a client (trims, converts to uppercase)
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of candidate room codes
///
/// The registry asks for candidates until one is free among live rooms.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> RoomCode;
}

/// Default generator backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn next_code(&self) -> RoomCode {
        RoomCode::generate()
    }
}

impl<F> CodeGenerator for F
where
    F: Fn() -> RoomCode + Send + Sync,
{
    fn next_code(&self) -> RoomCode {
        self()
    }
}
