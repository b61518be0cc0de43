//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, message
//! parsing, and translating client requests into registry calls. A
//! connection occupies at most one room; while it does, that room's events
//! are forwarded to the client.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, RoomError};
use crate::member::Member;
use crate::message::{ClientMessage, ErrorCode, ServerMessage};
use crate::registry::RoomRegistry;
use crate::room::LeaveOutcome;
use crate::subscriber::RoomSubscription;
use crate::types::{MemberId, RoomCode};

/// Outbound queue size per connection
const OUTBOUND_BUFFER: usize = 64;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle. On disconnect the connection's
/// membership is released, which deletes the room if it was the admin.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<RoomRegistry>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();
    info!("Connection {} established from {}", connection_id, peer_addr);

    // Send connection success message
    let connected_msg = ServerMessage::Connected {
        connection_id: connection_id.to_string(),
    };
    let json = serde_json::to_string(&connected_msg)?;
    ws_sender.send(WsMessage::Text(json.into())).await?;

    // Channel for replies and forwarded events -> client
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    // Spawn write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(WsMessage::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for connection");

        let _ = ws_sender.close().await;
    });

    let mut connection = Connection::new(connection_id, Arc::clone(&registry), msg_tx);

    // Read loop (WebSocket -> registry)
    let read_loop = async {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        if connection.handle(client_msg).await.is_err() {
                            debug!("Outbound channel closed for {}", connection_id);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", connection_id, e);
                        let reply = ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            format!("Invalid message format: {}", e),
                        );
                        if connection.send(reply).await.is_err() {
                            break;
                        }
                    }
                },
                Ok(WsMessage::Close(_)) => {
                    debug!("Connection {} sent close frame", connection_id);
                    break;
                }
                Ok(WsMessage::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", connection_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
        debug!("Read loop ended for {}", connection_id);
    };

    // Wait for either side to finish
    tokio::select! {
        _ = read_loop => {}
        _ = &mut write_task => {
            debug!("Write task completed for {}", connection_id);
        }
    }

    connection.disconnect().await;
    write_task.abort();

    info!("Connection {} closed", connection_id);

    Ok(())
}

/// Room the connection currently occupies
struct Membership {
    room_id: RoomCode,
    member_id: MemberId,
    /// Task forwarding room events to the client, once subscribed
    forwarder: Option<JoinHandle<()>>,
}

impl Membership {
    fn new(room_id: RoomCode, member_id: MemberId) -> Self {
        Self {
            room_id,
            member_id,
            forwarder: None,
        }
    }

    fn stop_forwarding(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Per-connection state
struct Connection {
    id: Uuid,
    registry: Arc<RoomRegistry>,
    outbound: mpsc::Sender<ServerMessage>,
    membership: Option<Membership>,
}

impl Connection {
    fn new(id: Uuid, registry: Arc<RoomRegistry>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            registry,
            outbound,
            membership: None,
        }
    }

    /// Queue a message for the client
    async fn send(&self, msg: ServerMessage) -> Result<(), AppError> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    /// Process one client request and reply
    async fn handle(&mut self, msg: ClientMessage) -> Result<(), AppError> {
        match msg {
            ClientMessage::CreateRoom {
                room_name,
                password,
                admin_name,
            } => self.handle_create(&room_name, &password, &admin_name).await,
            ClientMessage::ValidateAccess { room_id, password } => {
                let room = self.registry.validate_access(&room_id, &password).await;
                self.send(ServerMessage::AccessChecked { room }).await
            }
            ClientMessage::JoinRoom {
                room_id,
                password,
                username,
            } => self.handle_join(&room_id, &password, &username).await,
            ClientMessage::LeaveRoom => match self.leave().await {
                Some(Ok(outcome)) => self.send(ServerMessage::RoomLeft { outcome }).await,
                Some(Err(e)) => self.send(e.into()).await,
                None => self.send_not_in_room().await,
            },
            ClientMessage::PostMessage { body, ttl_seconds } => {
                self.handle_post(&body, ttl_seconds).await
            }
        }
    }

    async fn handle_create(
        &mut self,
        room_name: &str,
        password: &str,
        admin_name: &str,
    ) -> Result<(), AppError> {
        if self.membership.is_some() {
            return self.send_already_in_room().await;
        }

        match self.registry.create_room(room_name, password, admin_name).await {
            Ok((room_id, member)) => {
                info!("Connection {} created room {}", self.id, room_id);
                // Recorded first so a disconnect always releases the room
                self.membership = Some(Membership::new(room_id.clone(), member.id));
                self.send(ServerMessage::RoomCreated { room_id, member }).await?;
                self.attach().await;
                Ok(())
            }
            Err(e) => self.send(e.into()).await,
        }
    }

    async fn handle_join(
        &mut self,
        room_id: &str,
        password: &str,
        username: &str,
    ) -> Result<(), AppError> {
        if self.membership.is_some() {
            return self.send_already_in_room().await;
        }

        match self.registry.join_room(room_id, password, username).await {
            Ok(member) => self.finish_join(RoomCode::parse(room_id), member).await,
            Err(e) => self.send(e.into()).await,
        }
    }

    /// Follow a room just joined and report its current state
    ///
    /// If the room cannot be followed the member is taken out again.
    async fn finish_join(&mut self, room_id: RoomCode, member: Member) -> Result<(), AppError> {
        self.membership = Some(Membership::new(room_id.clone(), member.id));

        // Subscribe before the snapshot so no event falls in between
        let subscription = self.registry.subscribe(room_id.as_str()).await;
        let snapshot = self.registry.snapshot(room_id.as_str()).await;
        let (subscription, snapshot) = match (subscription, snapshot) {
            (Ok(subscription), Ok(snapshot)) => (subscription, snapshot),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Connection {} could not follow room {}: {}", self.id, room_id, e);
                let _ = self.leave().await;
                return self.send(e.into()).await;
            }
        };

        info!("Connection {} joined room {}", self.id, room_id);
        self.send(ServerMessage::RoomJoined { member, snapshot }).await?;

        let forwarder = spawn_forwarder(subscription, self.outbound.clone());
        if let Some(membership) = &mut self.membership {
            membership.forwarder = Some(forwarder);
        }
        Ok(())
    }

    async fn handle_post(&mut self, body: &str, ttl_seconds: Option<u64>) -> Result<(), AppError> {
        let Some(membership) = &self.membership else {
            return self.send_not_in_room().await;
        };

        let result = self
            .registry
            .post_message(
                membership.room_id.as_str(),
                membership.member_id,
                body,
                ttl_seconds,
            )
            .await;

        match result {
            Ok(message) => self.send(ServerMessage::MessageAccepted { message }).await,
            Err(e) => {
                if matches!(e, RoomError::RoomNotFound(_) | RoomError::MemberNotFound(_)) {
                    // Room is gone or we were removed; membership is stale
                    self.detach();
                }
                self.send(e.into()).await
            }
        }
    }

    /// Start forwarding the current room's events
    async fn attach(&mut self) {
        let Some(membership) = &self.membership else {
            return;
        };
        let room_id = membership.room_id.clone();

        match self.registry.subscribe(room_id.as_str()).await {
            Ok(subscription) => {
                let forwarder = spawn_forwarder(subscription, self.outbound.clone());
                if let Some(membership) = &mut self.membership {
                    membership.forwarder = Some(forwarder);
                }
            }
            Err(e) => warn!("Could not subscribe to room {}: {}", room_id, e),
        }
    }

    /// Leave the current room, if any
    async fn leave(&mut self) -> Option<Result<LeaveOutcome, RoomError>> {
        let mut membership = self.membership.take()?;
        membership.stop_forwarding();

        let result = self
            .registry
            .leave_room(membership.room_id.as_str(), membership.member_id)
            .await;
        match &result {
            Ok(outcome) => info!(
                "Connection {} left room {} ({:?})",
                self.id, membership.room_id, outcome
            ),
            Err(e) => debug!("Connection {} leave failed: {}", self.id, e),
        }
        Some(result)
    }

    /// Forget the current membership without contacting the room
    fn detach(&mut self) {
        if let Some(mut membership) = self.membership.take() {
            membership.stop_forwarding();
        }
    }

    /// Release everything held by this connection
    async fn disconnect(&mut self) {
        let _ = self.leave().await;
    }

    async fn send_not_in_room(&self) -> Result<(), AppError> {
        self.send(ServerMessage::error(
            ErrorCode::NotInRoom,
            "You are not in a room",
        ))
        .await
    }

    async fn send_already_in_room(&self) -> Result<(), AppError> {
        self.send(ServerMessage::error(
            ErrorCode::AlreadyInRoom,
            "You are already in a room",
        ))
        .await
    }
}

/// Forward a room's events to a client until either side goes away
fn spawn_forwarder(
    mut subscription: RoomSubscription,
    outbound: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let terminal = event.is_terminal();
            if outbound.send(ServerMessage::Event { event }).await.is_err() || terminal {
                break;
            }
        }
        debug!("Event forwarder for room {} ended", subscription.room_id());
    })
}
