//! Member struct definition
//!
//! Represents a named participant in one room.

use serde::Serialize;

use crate::types::MemberId;

/// Room participant
///
/// Display names are stored trimmed. Exactly one member of a live room
/// has `is_admin` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    /// Unique identifier within the room
    pub id: MemberId,
    /// Name shown to other members
    pub display_name: String,
    /// Room creator flag
    pub is_admin: bool,
}

impl Member {
    /// Create the admin member for a new room
    pub fn admin(display_name: &str) -> Self {
        Self::new(display_name, true)
    }

    /// Create a regular member
    pub fn guest(display_name: &str) -> Self {
        Self::new(display_name, false)
    }

    fn new(display_name: &str, is_admin: bool) -> Self {
        Self {
            id: MemberId::new(),
            display_name: display_name.trim().to_string(),
            is_admin,
        }
    }
}
