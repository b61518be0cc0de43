//! Membership validation
//!
//! Pure predicates over a room's state. No side effects, so the session
//! actor can call them inside its serialization point.

use crate::room::Room;
use crate::types::RoomCode;

/// Key used to compare display names: trimmed and case-folded
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Check a supplied room id and password against a room
///
/// The id comparison is case-insensitive; the password must match exactly.
pub fn matches_credentials(room: &Room, supplied_id: &str, supplied_password: &str) -> bool {
    RoomCode::parse(supplied_id) == *room.code() && room.password() == supplied_password
}

/// Whether `candidate` is free as a display name in `room`
pub fn is_username_available(room: &Room, candidate: &str) -> bool {
    let wanted = normalize_name(candidate);
    !room
        .members()
        .iter()
        .any(|member| normalize_name(&member.display_name) == wanted)
}
