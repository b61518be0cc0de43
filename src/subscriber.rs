//! Event subscribers
//!
//! A `Subscriber` is the session-side end of one event stream; a
//! `RoomSubscription` is the caller-side end. Channels are unbounded so a
//! slow consumer never stalls the room.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::error::SendError;
use crate::event::RoomEvent;
use crate::types::RoomCode;

/// Session-side handle for one attached subscription
#[derive(Debug)]
pub struct Subscriber {
    sender: mpsc::UnboundedSender<RoomEvent>,
}

impl Subscriber {
    /// Create a connected subscriber/subscription pair for `room_id`
    pub fn pair(room_id: RoomCode) -> (Self, RoomSubscription) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, RoomSubscription { room_id, receiver })
    }

    /// Push an event to this subscriber
    ///
    /// Returns an error if the subscription was dropped.
    pub fn send(&self, event: RoomEvent) -> Result<(), SendError> {
        self.sender
            .send(event)
            .map_err(|_| SendError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Live stream of one room's events
///
/// Only events occurring after the subscription was taken are delivered.
/// The stream ends after `RoomDeleted`, or if the room session stops.
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct RoomSubscription {
    room_id: RoomCode,
    receiver: mpsc::UnboundedReceiver<RoomEvent>,
}

impl RoomSubscription {
    pub fn room_id(&self) -> &RoomCode {
        &self.room_id
    }
}

impl Stream for RoomSubscription {
    type Item = RoomEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
