//! Ephemeral Chat Rooms Library
//!
//! Password-gated chat rooms that exist only while their creator stays.
//! When the admin leaves, the room and everything in it is gone; messages
//! can additionally expire on their own after a time-to-live.
//!
//! # Features
//! - Room creation with 6-character codes
//! - Access validation (case-insensitive code, exact password)
//! - Joining under a room-unique display name
//! - Cascading room deletion when the admin leaves
//! - Per-message ttl eviction
//! - Event subscriptions per room
//! - WebSocket front end
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each room runs as a `RoomSession` actor owning the room state and its
//!   expiry scheduler, so operations on one room are serialized
//! - `RoomRegistry` maps room codes to session handles behind a short-lived lock
//! - Each connection has a `handler` task calling into the registry
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use ephemeral_chat::{handle_connection, RoomConfig, RoomRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let registry = Arc::new(RoomRegistry::new(RoomConfig::default()));
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, Arc::clone(&registry)));
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod member;
pub mod message;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod session;
pub mod subscriber;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use config::{RoomConfig, ServerConfig};
pub use error::{AppError, InvariantViolation, RoomError, SendError};
pub use event::RoomEvent;
pub use handler::handle_connection;
pub use member::Member;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use registry::RoomRegistry;
pub use room::{LeaveOutcome, Message, Room, RoomSnapshot, RoomSummary};
pub use scheduler::ExpiryScheduler;
pub use session::{RoomHandle, RoomSession};
pub use subscriber::RoomSubscription;
pub use types::{CodeGenerator, MemberId, MessageId, RoomCode};
