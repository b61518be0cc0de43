//! Room struct definition
//!
//! A password-gated chat room with one admin, any number of guests and a
//! message log whose entries may carry a time-to-live. The struct is plain
//! synchronous state; the session actor serializes access to it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::time::Instant;

use crate::error::{InvariantViolation, RoomError};
use crate::event::RoomEvent;
use crate::member::Member;
use crate::types::{MemberId, MessageId, RoomCode};
use crate::validator;

/// Lifecycle state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomState {
    Active,
    Deleted,
}

/// Result of a successful leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// The admin left; the whole room is gone
    RoomDeleted,
    /// A guest left; the room lives on
    MemberRemoved,
}

/// Chat message in a room's log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: MemberId,
    /// Sender's display name at posting time
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Time left before eviction; `None` never expires
    #[serde(rename = "remaining_ttl_secs", serialize_with = "ttl_as_secs")]
    pub remaining_ttl: Option<Duration>,
    /// Point up to which `remaining_ttl` already accounts for elapsed time
    #[serde(skip)]
    aged_until: Instant,
}

fn ttl_as_secs<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    // Round up so a message never reads as 0s while still visible
    let secs = ttl.map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0));
    secs.serialize(serializer)
}

/// Read-only view returned by access validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: RoomCode,
    pub name: String,
    pub member_count: usize,
}

/// Current members and messages, for clients attaching to a room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub id: RoomCode,
    pub name: String,
    pub admin_id: Option<MemberId>,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Member>,
    pub messages: Vec<Message>,
}

#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    name: String,
    password: String,
    admin_id: Option<MemberId>,
    /// Join order
    members: Vec<Member>,
    /// `created_at` non-decreasing
    messages: Vec<Message>,
    state: RoomState,
    created_at: DateTime<Utc>,
    /// Events recorded since the last `take_events`
    events: Vec<RoomEvent>,
}

impl Room {
    /// Create an unseeded room; call `add_admin` before exposing it
    pub fn new(code: RoomCode, name: String, password: String) -> Self {
        Self {
            code,
            name: name.trim().to_string(),
            password,
            admin_id: None,
            members: Vec::new(),
            messages: Vec::new(),
            state: RoomState::Active,
            created_at: Utc::now(),
            events: Vec::new(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn admin_id(&self) -> Option<MemberId> {
        self.admin_id
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_deleted(&self) -> bool {
        self.state == RoomState::Deleted
    }

    pub fn member(&self, member_id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    /// Seed the room with its admin
    ///
    /// Only valid once, right after construction.
    pub fn add_admin(&mut self, admin_name: &str) -> Result<Member, RoomError> {
        self.ensure_active()?;
        if self.admin_id.is_some() {
            return Err(RoomError::AlreadySeeded);
        }
        if admin_name.trim().is_empty() {
            return Err(RoomError::InvalidInput("display name must not be blank"));
        }

        let admin = Member::admin(admin_name);
        self.admin_id = Some(admin.id);
        self.members.push(admin.clone());
        Ok(admin)
    }

    /// Admit a new guest under a room-unique display name
    pub fn join(&mut self, display_name: &str) -> Result<Member, RoomError> {
        self.ensure_active()?;
        if display_name.trim().is_empty() {
            return Err(RoomError::InvalidInput("display name must not be blank"));
        }
        if !validator::is_username_available(self, display_name) {
            return Err(RoomError::UsernameTaken(display_name.trim().to_string()));
        }

        let member = Member::guest(display_name);
        self.members.push(member.clone());
        self.events.push(RoomEvent::MemberJoined {
            member: member.clone(),
        });
        Ok(member)
    }

    /// Remove a member
    ///
    /// The admin leaving deletes the room: members and messages are
    /// cleared and `RoomDeleted` is recorded.
    pub fn leave(&mut self, member_id: MemberId) -> Result<LeaveOutcome, RoomError> {
        self.ensure_active()?;

        if self.admin_id == Some(member_id) {
            self.teardown();
            return Ok(LeaveOutcome::RoomDeleted);
        }

        let Some(index) = self.members.iter().position(|m| m.id == member_id) else {
            return Err(RoomError::MemberNotFound(member_id.to_string()));
        };

        let member = self.members.remove(index);
        self.events.push(RoomEvent::MemberLeft {
            member_id: member.id,
            display_name: member.display_name,
        });
        Ok(LeaveOutcome::MemberRemoved)
    }

    /// Append a message from a current member
    pub fn post_message(
        &mut self,
        sender_id: MemberId,
        body: &str,
        ttl: Option<Duration>,
    ) -> Result<Message, RoomError> {
        self.ensure_active()?;

        let Some(sender) = self.member(sender_id) else {
            return Err(RoomError::MemberNotFound(sender_id.to_string()));
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(RoomError::InvalidInput("message body must not be blank"));
        }

        // Wall clock may step backwards; keep the log ordered regardless
        let now = Utc::now();
        let created_at = match self.messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let message = Message {
            id: MessageId::new(),
            sender_id,
            sender_name: sender.display_name.clone(),
            body: body.to_string(),
            created_at,
            remaining_ttl: ttl,
            aged_until: Instant::now(),
        };
        self.messages.push(message.clone());
        self.events.push(RoomEvent::MessagePosted {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Age every timed message by `elapsed` and evict the ones that ran out
    ///
    /// Returns the number of evicted messages.
    pub fn tick(&mut self, elapsed: Duration) -> usize {
        self.age_messages(|message| {
            message.aged_until += elapsed;
            elapsed
        })
    }

    /// Age every timed message up to `now` and evict the ones that ran out
    ///
    /// Each message is aged only by the time since it was posted or last
    /// aged, so a countdown never covers time before the message existed.
    pub fn tick_at(&mut self, now: Instant) -> usize {
        self.age_messages(|message| {
            let elapsed = now.saturating_duration_since(message.aged_until);
            message.aged_until = message.aged_until.max(now);
            elapsed
        })
    }

    fn age_messages<F>(&mut self, mut elapsed_for: F) -> usize
    where
        F: FnMut(&mut Message) -> Duration,
    {
        if self.is_deleted() {
            return 0;
        }

        let mut expired = Vec::new();
        self.messages.retain_mut(|message| {
            if message.remaining_ttl.is_none() {
                return true;
            }
            let elapsed = elapsed_for(message);
            let Some(ttl) = message.remaining_ttl.as_mut() else {
                return true;
            };
            *ttl = ttl.saturating_sub(elapsed);
            if ttl.is_zero() {
                expired.push(message.id);
                false
            } else {
                true
            }
        });

        let count = expired.len();
        self.events.extend(
            expired
                .into_iter()
                .map(|message_id| RoomEvent::MessageExpired { message_id }),
        );
        count
    }

    /// Verify the per-room invariants of an active room
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_deleted() {
            return Ok(());
        }
        if self.members.is_empty() {
            return Err(InvariantViolation("active room has no members"));
        }
        let Some(admin_id) = self.admin_id else {
            return Err(InvariantViolation("active room has no admin id"));
        };

        let mut admins = self.members.iter().filter(|m| m.is_admin);
        match (admins.next(), admins.next()) {
            (Some(admin), None) if admin.id == admin_id => {}
            (Some(_), None) => return Err(InvariantViolation("admin flag on wrong member")),
            (None, _) => return Err(InvariantViolation("no member is admin")),
            (Some(_), Some(_)) => return Err(InvariantViolation("more than one admin")),
        }

        let ordered = self
            .messages
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at);
        if !ordered {
            return Err(InvariantViolation("message log out of order"));
        }
        Ok(())
    }

    /// Destroy the room: drop all members and messages, record `RoomDeleted`
    ///
    /// No-op on an already deleted room.
    pub fn teardown(&mut self) {
        if self.is_deleted() {
            return;
        }
        self.state = RoomState::Deleted;
        self.members.clear();
        self.messages.clear();
        self.events.push(RoomEvent::RoomDeleted {
            room_id: self.code.clone(),
        });
    }

    /// Drain events recorded since the last call, in occurrence order
    pub fn take_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.code.clone(),
            name: self.name.clone(),
            member_count: self.members.len(),
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.code.clone(),
            name: self.name.clone(),
            admin_id: self.admin_id,
            created_at: self.created_at,
            members: self.members.clone(),
            messages: self.messages.clone(),
        }
    }

    fn ensure_active(&self) -> Result<(), RoomError> {
        if self.is_deleted() {
            Err(RoomError::RoomNotFound(self.code.to_string()))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn members_mut(&mut self) -> &mut Vec<Member> {
        &mut self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_room() -> (Room, Member) {
        let mut room = Room::new(
            RoomCode("AB12CD".to_string()),
            "Friends".to_string(),
            "secret".to_string(),
        );
        let admin = room.add_admin("Alice").unwrap();
        room.take_events();
        (room, admin)
    }

    #[test]
    fn test_room_creation() {
        let (room, admin) = seeded_room();

        assert_eq!(room.code().as_str(), "AB12CD");
        assert_eq!(room.name(), "Friends");
        assert_eq!(room.admin_id(), Some(admin.id));
        assert!(admin.is_admin);
        assert_eq!(room.members().len(), 1);
        assert!(!room.is_deleted());
        assert!(room.check_invariants().is_ok());
    }

    #[test]
    fn test_add_admin_twice_fails() {
        let (mut room, _) = seeded_room();
        assert_eq!(room.add_admin("Mallory"), Err(RoomError::AlreadySeeded));
        assert_eq!(room.members().len(), 1);
    }

    #[test]
    fn test_join_in_order() {
        let (mut room, admin) = seeded_room();

        let bob = room.join("Bob").unwrap();
        let carol = room.join("  Carol  ").unwrap();

        assert!(!bob.is_admin);
        assert_eq!(carol.display_name, "Carol");
        let ids: Vec<_> = room.members().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![admin.id, bob.id, carol.id]);

        let events = room.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RoomEvent::MemberJoined { member: bob });
    }

    #[test]
    fn test_join_username_taken() {
        let (mut room, _) = seeded_room();
        room.join("Bob").unwrap();

        assert_eq!(
            room.join("  bob "),
            Err(RoomError::UsernameTaken("bob".to_string()))
        );
        assert!(matches!(room.join("alice"), Err(RoomError::UsernameTaken(_))));
        assert_eq!(room.members().len(), 2);
    }

    #[test]
    fn test_join_blank_name() {
        let (mut room, _) = seeded_room();
        assert!(matches!(room.join("   "), Err(RoomError::InvalidInput(_))));
    }

    #[test]
    fn test_guest_leave_keeps_everything_else() {
        let (mut room, admin) = seeded_room();
        let bob = room.join("Bob").unwrap();
        let carol = room.join("Carol").unwrap();
        room.post_message(bob.id, "hi", None).unwrap();
        room.post_message(admin.id, "hello", None).unwrap();
        room.take_events();

        assert_eq!(room.leave(bob.id), Ok(LeaveOutcome::MemberRemoved));

        let ids: Vec<_> = room.members().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![admin.id, carol.id]);
        assert_eq!(room.messages().len(), 2);
        assert_eq!(
            room.take_events(),
            vec![RoomEvent::MemberLeft {
                member_id: bob.id,
                display_name: "Bob".to_string(),
            }]
        );
    }

    #[test]
    fn test_guest_leave_twice() {
        let (mut room, _) = seeded_room();
        let bob = room.join("Bob").unwrap();
        room.leave(bob.id).unwrap();
        assert!(matches!(room.leave(bob.id), Err(RoomError::MemberNotFound(_))));
    }

    #[test]
    fn test_room_survives_with_only_admin() {
        let (mut room, _) = seeded_room();
        let bob = room.join("Bob").unwrap();
        room.leave(bob.id).unwrap();

        assert!(!room.is_deleted());
        assert_eq!(room.members().len(), 1);
        assert!(room.check_invariants().is_ok());
    }

    #[test]
    fn test_admin_leave_deletes_room() {
        let (mut room, admin) = seeded_room();
        let bob = room.join("Bob").unwrap();
        room.post_message(bob.id, "bye", Some(Duration::from_secs(30)))
            .unwrap();
        room.take_events();

        assert_eq!(room.leave(admin.id), Ok(LeaveOutcome::RoomDeleted));
        assert!(room.is_deleted());
        assert!(room.members().is_empty());
        assert!(room.messages().is_empty());
        assert_eq!(
            room.take_events(),
            vec![RoomEvent::RoomDeleted {
                room_id: RoomCode("AB12CD".to_string()),
            }]
        );

        // Deleted is terminal
        assert!(matches!(room.join("Carol"), Err(RoomError::RoomNotFound(_))));
        assert!(matches!(room.leave(bob.id), Err(RoomError::RoomNotFound(_))));
        assert!(matches!(
            room.post_message(bob.id, "x", None),
            Err(RoomError::RoomNotFound(_))
        ));
        assert_eq!(room.tick(Duration::from_secs(60)), 0);
        assert!(room.take_events().is_empty());
    }

    #[test]
    fn test_post_message() {
        let (mut room, admin) = seeded_room();

        let message = room
            .post_message(admin.id, "  hello world ", Some(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(message.body, "hello world");
        assert_eq!(message.sender_name, "Alice");
        assert_eq!(message.remaining_ttl, Some(Duration::from_secs(30)));
        assert_eq!(room.messages().len(), 1);
        assert_eq!(
            room.take_events(),
            vec![RoomEvent::MessagePosted { message }]
        );
    }

    #[test]
    fn test_post_message_rejects_unknown_sender_and_blank_body() {
        let (mut room, admin) = seeded_room();

        assert!(matches!(
            room.post_message(MemberId::new(), "hi", None),
            Err(RoomError::MemberNotFound(_))
        ));
        assert!(matches!(
            room.post_message(admin.id, "   ", None),
            Err(RoomError::InvalidInput(_))
        ));
        assert!(room.messages().is_empty());
    }

    #[test]
    fn test_post_after_leave_fails() {
        let (mut room, _) = seeded_room();
        let bob = room.join("Bob").unwrap();
        room.leave(bob.id).unwrap();
        assert!(matches!(
            room.post_message(bob.id, "still here?", None),
            Err(RoomError::MemberNotFound(_))
        ));
    }

    #[test]
    fn test_messages_ordered() {
        let (mut room, admin) = seeded_room();
        for i in 0..20 {
            room.post_message(admin.id, &format!("m{}", i), None).unwrap();
        }
        assert!(room
            .messages()
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
        assert!(room.check_invariants().is_ok());
    }

    #[test]
    fn test_ttl_boundary() {
        let (mut room, admin) = seeded_room();
        let message = room
            .post_message(admin.id, "poof", Some(Duration::from_secs(30)))
            .unwrap();
        room.take_events();

        for _ in 0..29 {
            assert_eq!(room.tick(Duration::from_secs(1)), 0);
        }
        assert_eq!(room.messages().len(), 1);
        assert_eq!(
            room.messages()[0].remaining_ttl,
            Some(Duration::from_secs(1))
        );
        assert!(room.take_events().is_empty());

        assert_eq!(room.tick(Duration::from_secs(1)), 1);
        assert!(room.messages().is_empty());
        assert_eq!(
            room.take_events(),
            vec![RoomEvent::MessageExpired {
                message_id: message.id
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_at_ages_from_post_time() {
        let (mut room, admin) = seeded_room();
        let start = Instant::now();

        room.post_message(admin.id, "early", Some(Duration::from_secs(5)))
            .unwrap();
        tokio::time::advance(Duration::from_millis(4900)).await;
        let late = room
            .post_message(admin.id, "late", Some(Duration::from_secs(5)))
            .unwrap();

        // Tick 0.1s after the late post: only the early message is due
        assert_eq!(room.tick_at(start + Duration::from_secs(5)), 1);
        assert_eq!(room.messages().len(), 1);
        assert_eq!(room.messages()[0].id, late.id);
        assert_eq!(
            room.messages()[0].remaining_ttl,
            Some(Duration::from_millis(4900))
        );

        assert_eq!(room.tick_at(start + Duration::from_millis(9800)), 0);
        assert_eq!(room.tick_at(start + Duration::from_millis(9900)), 1);
        assert!(room.messages().is_empty());
    }

    #[test]
    fn test_tick_overshoot_and_untimed() {
        let (mut room, admin) = seeded_room();
        room.post_message(admin.id, "forever", None).unwrap();
        room.post_message(admin.id, "short", Some(Duration::from_secs(2)))
            .unwrap();
        room.post_message(admin.id, "long", Some(Duration::from_secs(10)))
            .unwrap();

        assert_eq!(room.tick(Duration::from_secs(5)), 1);
        let bodies: Vec<_> = room.messages().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["forever", "long"]);

        assert_eq!(room.tick(Duration::from_secs(3600)), 1);
        assert_eq!(room.messages().len(), 1);
        assert_eq!(room.messages()[0].body, "forever");
    }

    #[test]
    fn test_summary_and_snapshot() {
        let (mut room, admin) = seeded_room();
        room.join("Bob").unwrap();
        room.post_message(admin.id, "hi", None).unwrap();

        let summary = room.summary();
        assert_eq!(summary.member_count, 2);
        assert_eq!(summary.name, "Friends");

        let snapshot = room.snapshot();
        assert_eq!(snapshot.members.len(), 2);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.admin_id, Some(admin.id));
    }

    #[test]
    fn test_invariant_violation_detected() {
        let (mut room, _) = seeded_room();
        room.members_mut()[0].is_admin = false;
        assert!(room.check_invariants().is_err());

        let (mut room, _) = seeded_room();
        room.members_mut().clear();
        assert!(room.check_invariants().is_err());

        let (mut room, _) = seeded_room();
        room.join("Bob").unwrap();
        room.members_mut()[1].is_admin = true;
        assert!(room.check_invariants().is_err());
    }

    #[test]
    fn test_ttl_serializes_as_seconds() {
        let (mut room, admin) = seeded_room();
        let message = room
            .post_message(admin.id, "hi", Some(Duration::from_millis(2500)))
            .unwrap();
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"remaining_ttl_secs\":3"));
    }
}
