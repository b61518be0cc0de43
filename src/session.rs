//! RoomSession actor implementation
//!
//! Each live room runs as one actor task that owns its `Room`, its expiry
//! scheduler and its subscribers. Commands and scheduler ticks are handled
//! in a single loop, so operations on one room never interleave while
//! different rooms proceed in parallel.
//!
//! The loop exits right after the room is deleted. That drops the scheduler
//! and every subscriber, so no tick or event can follow `RoomDeleted`.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::member::Member;
use crate::room::{LeaveOutcome, Message, Room, RoomSnapshot, RoomSummary};
use crate::scheduler::ExpiryScheduler;
use crate::subscriber::{RoomSubscription, Subscriber};
use crate::types::{MemberId, RoomCode};
use crate::validator;

type Reply<T> = oneshot::Sender<T>;

/// Commands sent from the registry to a room session
#[derive(Debug)]
pub enum RoomCommand {
    /// Check credentials and describe the room
    Validate {
        room_id: String,
        password: String,
        reply: Reply<Option<RoomSummary>>,
    },
    /// Re-check credentials, then admit a new member
    Join {
        room_id: String,
        password: String,
        display_name: String,
        reply: Reply<Result<Member, RoomError>>,
    },
    /// Remove a member (admin: delete the room)
    Leave {
        member_id: MemberId,
        reply: Reply<Result<LeaveOutcome, RoomError>>,
    },
    /// Append a message
    Post {
        member_id: MemberId,
        body: String,
        ttl: Option<Duration>,
        reply: Reply<Result<Message, RoomError>>,
    },
    /// Attach a new event stream
    Subscribe { reply: Reply<RoomSubscription> },
    /// Current members and messages
    Snapshot { reply: Reply<RoomSnapshot> },
    /// Strip the admin flag to exercise invariant handling
    #[cfg(test)]
    Corrupt { reply: Reply<()> },
}

/// Cloneable address of a running room session
///
/// Every request fails with `RoomNotFound` once the session has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the session behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles address the same session
    pub fn same_session(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub async fn validate(&self, room_id: &str, password: &str) -> Option<RoomSummary> {
        self.request(|reply| RoomCommand::Validate {
            room_id: room_id.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn join(
        &self,
        room_id: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Member, RoomError> {
        self.request(|reply| RoomCommand::Join {
            room_id: room_id.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
            reply,
        })
        .await?
    }

    pub async fn leave(&self, member_id: MemberId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { member_id, reply })
            .await?
    }

    pub async fn post(
        &self,
        member_id: MemberId,
        body: &str,
        ttl: Option<Duration>,
    ) -> Result<Message, RoomError> {
        self.request(|reply| RoomCommand::Post {
            member_id,
            body: body.to_string(),
            ttl,
            reply,
        })
        .await?
    }

    pub async fn subscribe(&self) -> Result<RoomSubscription, RoomError> {
        self.request(|reply| RoomCommand::Subscribe { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    #[cfg(test)]
    pub(crate) async fn corrupt(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Corrupt { reply }).await
    }

    /// Send a command and wait for its reply
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.not_found())?;
        reply_rx.await.map_err(|_| self.not_found())
    }

    fn not_found(&self) -> RoomError {
        RoomError::RoomNotFound(self.code.to_string())
    }
}

/// The per-room actor
pub struct RoomSession {
    room: Room,
    scheduler: ExpiryScheduler,
    subscribers: Vec<Subscriber>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomSession {
    /// Spawn a session for a seeded room and return its handle
    pub fn spawn(room: Room, config: &RoomConfig) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(config.command_buffer);
        let handle = RoomHandle {
            code: room.code().clone(),
            sender,
        };
        let session = Self {
            room,
            scheduler: ExpiryScheduler::new(config.tick_interval),
            subscribers: Vec::new(),
            receiver,
        };
        tokio::spawn(session.run());
        handle
    }

    /// Run the session loop until the room is deleted or every handle is gone
    pub async fn run(mut self) {
        info!("Room {} session started", self.room.code());

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        // Registry dropped every handle
                        self.room.teardown();
                        self.flush_events();
                        break;
                    };
                    self.handle_command(cmd);
                }
                now = self.scheduler.tick() => {
                    self.handle_tick(now);
                }
            }

            if self.room.is_deleted() {
                break;
            }
        }

        info!("Room {} session stopped", self.room.code());
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Validate {
                room_id,
                password,
                reply,
            } => {
                let summary = validator::matches_credentials(&self.room, &room_id, &password)
                    .then(|| self.room.summary());
                let _ = reply.send(summary);
            }
            RoomCommand::Join {
                room_id,
                password,
                display_name,
                reply,
            } => {
                let result = self.handle_join(&room_id, &password, &display_name);
                self.settle();
                let _ = reply.send(result);
            }
            RoomCommand::Leave { member_id, reply } => {
                let result = self.room.leave(member_id);
                match &result {
                    Ok(LeaveOutcome::RoomDeleted) => {
                        info!("Admin {} left, room {} deleted", member_id, self.room.code());
                    }
                    Ok(LeaveOutcome::MemberRemoved) => {
                        info!("Member {} left room {}", member_id, self.room.code());
                    }
                    Err(e) => debug!("Leave rejected in room {}: {}", self.room.code(), e),
                }
                self.settle();
                let _ = reply.send(result);
            }
            RoomCommand::Post {
                member_id,
                body,
                ttl,
                reply,
            } => {
                let result = self.room.post_message(member_id, &body, ttl);
                if let Ok(message) = &result {
                    debug!(
                        "Message {} posted in room {} (ttl: {:?})",
                        message.id,
                        self.room.code(),
                        ttl
                    );
                }
                self.settle();
                let _ = reply.send(result);
            }
            RoomCommand::Subscribe { reply } => {
                self.subscribers.retain(|subscriber| !subscriber.is_closed());
                let (subscriber, subscription) = Subscriber::pair(self.room.code().clone());
                if reply.send(subscription).is_ok() {
                    self.subscribers.push(subscriber);
                }
                debug!(
                    "Room {} subscribers: {}",
                    self.room.code(),
                    self.subscribers.len()
                );
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            #[cfg(test)]
            RoomCommand::Corrupt { reply } => {
                for member in self.room.members_mut() {
                    member.is_admin = false;
                }
                self.settle();
                let _ = reply.send(());
            }
        }
    }

    fn handle_join(
        &mut self,
        room_id: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Member, RoomError> {
        // Credentials may have been checked earlier by the caller; check
        // again here where no other operation can interleave
        if !validator::matches_credentials(&self.room, room_id, password) {
            return Err(RoomError::AccessDenied);
        }
        let member = self.room.join(display_name)?;
        info!(
            "{} ({}) joined room {}",
            member.display_name,
            member.id,
            self.room.code()
        );
        Ok(member)
    }

    /// Age messages up to `now`
    fn handle_tick(&mut self, now: Instant) {
        let expired = self.room.tick_at(now);
        if expired > 0 {
            debug!("Room {}: {} message(s) expired", self.room.code(), expired);
        }
        self.settle();
    }

    /// After a mutation: verify invariants, then publish recorded events
    ///
    /// A broken invariant tears the room down.
    fn settle(&mut self) {
        if let Err(violation) = self.room.check_invariants() {
            error!(
                "Room {}: {}; tearing room down",
                self.room.code(),
                violation
            );
            self.room.teardown();
        }
        self.flush_events();
    }

    /// Deliver recorded events to every subscriber, dropping closed ones
    fn flush_events(&mut self) {
        let events = self.room.take_events();
        if events.is_empty() {
            return;
        }
        self.subscribers.retain(|subscriber| {
            events
                .iter()
                .all(|event| subscriber.send(event.clone()).is_ok())
        });
        if self.room.is_deleted() {
            self.subscribers.clear();
        }
    }
}
