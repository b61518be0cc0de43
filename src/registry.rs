//! RoomRegistry implementation
//!
//! Owns the collection of live rooms and routes every request to the right
//! room session. The collection lock is held only to insert, remove or
//! clone a room handle, never while a room operation is in flight.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::member::Member;
use crate::room::{LeaveOutcome, Message, Room, RoomSnapshot, RoomSummary};
use crate::session::{RoomHandle, RoomSession};
use crate::subscriber::RoomSubscription;
use crate::types::{CodeGenerator, MemberId, RandomCodes, RoomCode};

pub struct RoomRegistry {
    /// All live rooms: RoomCode -> session handle
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    codes: Box<dyn CodeGenerator>,
    config: RoomConfig,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self::with_code_generator(config, RandomCodes)
    }

    /// Create a registry drawing room codes from `codes`
    pub fn with_code_generator(config: RoomConfig, codes: impl CodeGenerator + 'static) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            codes: Box::new(codes),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Create a room seeded with its admin
    ///
    /// Returns the new room code and the admin member.
    pub async fn create_room(
        &self,
        name: &str,
        password: &str,
        admin_name: &str,
    ) -> Result<(RoomCode, Member), RoomError> {
        if name.trim().is_empty() {
            return Err(RoomError::InvalidInput("room name must not be blank"));
        }
        if password.trim().is_empty() {
            return Err(RoomError::InvalidInput("password must not be blank"));
        }
        if admin_name.trim().is_empty() {
            return Err(RoomError::InvalidInput("display name must not be blank"));
        }

        let mut rooms = self.rooms.write().await;

        let code = self.allocate_code(&rooms)?;
        let mut room = Room::new(code.clone(), name.to_string(), password.to_string());
        let admin = room.add_admin(admin_name)?;

        let handle = RoomSession::spawn(room, &self.config);
        rooms.insert(code.clone(), handle);

        info!(
            "{} ({}) created room {} '{}'",
            admin.display_name,
            admin.id,
            code,
            name.trim()
        );
        debug!("Total rooms: {}", rooms.len());

        Ok((code, admin))
    }

    /// Check a room id and password
    ///
    /// Returns `None` for any mismatch, including unknown rooms.
    pub async fn validate_access(&self, room_id: &str, password: &str) -> Option<RoomSummary> {
        let handle = self.lookup(room_id).await.ok()?;
        let summary = handle.validate(room_id, password).await;
        if summary.is_none() {
            debug!("Access check failed for room {}", handle.code());
        }
        summary
    }

    /// Join a room under a new display name
    ///
    /// Credentials are checked again inside the room, so an earlier
    /// `validate_access` result is never trusted.
    pub async fn join_room(
        &self,
        room_id: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Member, RoomError> {
        let handle = self.lookup(room_id).await?;
        handle.join(room_id, password, display_name).await
    }

    /// Remove a member; the admin leaving deletes the room
    pub async fn leave_room(
        &self,
        room_id: &str,
        member_id: MemberId,
    ) -> Result<LeaveOutcome, RoomError> {
        let handle = self.lookup(room_id).await?;
        let outcome = handle.leave(member_id).await?;
        if outcome == LeaveOutcome::RoomDeleted {
            self.remove(&handle).await;
        }
        Ok(outcome)
    }

    /// Post a message
    ///
    /// Without `ttl_seconds` the configured default ttl applies.
    pub async fn post_message(
        &self,
        room_id: &str,
        member_id: MemberId,
        body: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<Message, RoomError> {
        let ttl = ttl_seconds
            .map(Duration::from_secs)
            .or(self.config.default_ttl);
        let handle = self.lookup(room_id).await?;
        handle.post(member_id, body, ttl).await
    }

    /// Attach a new event stream to a room
    pub async fn subscribe(&self, room_id: &str) -> Result<RoomSubscription, RoomError> {
        let handle = self.lookup(room_id).await?;
        handle.subscribe().await
    }

    /// Current members and messages of a room
    pub async fn snapshot(&self, room_id: &str) -> Result<RoomSnapshot, RoomError> {
        let handle = self.lookup(room_id).await?;
        handle.snapshot().await
    }

    /// Number of live rooms
    pub async fn room_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    /// Pick a code not used by any live room
    fn allocate_code(&self, rooms: &HashMap<RoomCode, RoomHandle>) -> Result<RoomCode, RoomError> {
        let attempts = self.config.max_code_attempts;
        for attempt in 1..=attempts {
            let code = self.codes.next_code();
            match rooms.get(&code) {
                Some(handle) if !handle.is_closed() => {
                    debug!("Room code {} in use (attempt {})", code, attempt);
                }
                _ => return Ok(code),
            }
        }
        warn!("No free room code after {} attempts", attempts);
        Err(RoomError::CodeSpaceExhausted(attempts))
    }

    /// Find the session for a client-supplied room id
    async fn lookup(&self, room_id: &str) -> Result<RoomHandle, RoomError> {
        let code = RoomCode::parse(room_id);
        let handle = self.rooms.read().await.get(&code).cloned();
        match handle {
            Some(handle) if !handle.is_closed() => Ok(handle),
            Some(handle) => {
                // Session stopped on its own (forced teardown)
                self.remove(&handle).await;
                Err(RoomError::RoomNotFound(code.to_string()))
            }
            None => Err(RoomError::RoomNotFound(code.to_string())),
        }
    }

    /// Drop `handle` from the collection unless its code was reused
    async fn remove(&self, handle: &RoomHandle) {
        let mut rooms = self.rooms.write().await;
        let current = rooms.get(handle.code());
        if current.is_some_and(|current| current.same_session(handle)) {
            rooms.remove(handle.code());
            info!("Room {} removed", handle.code());
            debug!("Total rooms: {}", rooms.len());
        }
    }
}
