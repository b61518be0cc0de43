//! Room events
//!
//! State changes a room reports to its subscribers. Serialized with a
//! tagged enum so the WebSocket layer can forward them unchanged.

use serde::Serialize;

use crate::member::Member;
use crate::room::Message;
use crate::types::{MemberId, MessageId, RoomCode};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A new non-admin member was admitted
    MemberJoined { member: Member },
    /// A non-admin member left
    MemberLeft { member_id: MemberId, display_name: String },
    /// A message was appended to the log
    MessagePosted { message: Message },
    /// A timed message reached the end of its ttl and was evicted
    MessageExpired { message_id: MessageId },
    /// The room was destroyed; no further events follow
    RoomDeleted { room_id: RoomCode },
}

impl RoomEvent {
    /// Whether this event ends the room's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoomEvent::RoomDeleted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialize() {
        let event = RoomEvent::RoomDeleted {
            room_id: RoomCode("AB12CD".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"room_deleted\""));
        assert!(json.contains("\"room_id\":\"AB12CD\""));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_member_joined_serialize() {
        let event = RoomEvent::MemberJoined {
            member: Member::guest("Bob"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"member_joined\""));
        assert!(json.contains("\"display_name\":\"Bob\""));
        assert!(json.contains("\"is_admin\":false"));
        assert!(!event.is_terminal());
    }
}
