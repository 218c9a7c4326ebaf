//! RealtimeHub - the real-time layer's entry point.
//!
//! Ties together room membership, the publisher and the relay state, and
//! implements the client protocol on top of them.
//!
//! # Delivery
//!
//! Events always go to the bus first. When the relay is `Subscribed` this
//! process gets its own publish back and emits it then; otherwise (or when
//! the publish failed) the hub emits to the local room directly. Either way
//! a connection sees each event once.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::application::MessagePublisher;
use crate::domain::foundation::{AuthenticatedUser, ConnectionId, ConversationId};
use crate::domain::messaging::{MessageEvent, TypingEvent};
use crate::ports::ParticipantChecker;

use super::messages::{
    ClientMessage, ConnectedMessage, RoomAck, RoomRequest, SendMessageRequest, ServerMessage,
    TypingRequest,
};
use super::relay::RelayState;
use super::rooms::RoomRegistry;

/// Client request rejected at the real-time boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Not a participant of this conversation")]
    NotParticipant,

    #[error("Join the conversation first")]
    NotJoined,

    #[error("Could not verify conversation membership")]
    CheckFailed,

    #[error("Connection is closed")]
    ConnectionClosed,
}

impl RealtimeError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidMessage(reason.into())
    }

    /// Error code sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::InvalidMessage(_) => "INVALID_MESSAGE",
            RealtimeError::NotParticipant => "NOT_PARTICIPANT",
            RealtimeError::NotJoined => "NOT_JOINED",
            RealtimeError::CheckFailed => "CHECK_FAILED",
            RealtimeError::ConnectionClosed => "CONNECTION_CLOSED",
        }
    }

    pub fn to_server_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

/// How an event reached this process's connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Published; the relay emits it when it comes back.
    Bus,
    /// Emitted directly to this many local connections.
    Local(usize),
}

pub struct RealtimeHub {
    rooms: Arc<RoomRegistry>,
    publisher: MessagePublisher,
    participants: Arc<dyn ParticipantChecker>,
    relay_state: watch::Receiver<RelayState>,
    queue_capacity: usize,
}

impl RealtimeHub {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        publisher: MessagePublisher,
        participants: Arc<dyn ParticipantChecker>,
        relay_state: watch::Receiver<RelayState>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            rooms,
            publisher,
            participants,
            relay_state,
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn relay_state(&self) -> RelayState {
        *self.relay_state.borrow()
    }

    /// Registers a new connection and queues its `connected` ack.
    ///
    /// The returned receiver is the connection's outbound queue.
    pub async fn connect(&self, user: &AuthenticatedUser) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (sink, outbound) = mpsc::channel(self.queue_capacity);
        let connection = ConnectionId::new();
        self.rooms.register(connection, sink).await;
        self.rooms
            .send_to(
                connection,
                ServerMessage::Connected(ConnectedMessage {
                    connection_id: connection,
                    user_id: user.id.clone(),
                }),
            )
            .await;

        tracing::info!(connection_id = %connection, user_id = %user.id, "Connection opened");
        (connection, outbound)
    }

    /// Drops the connection from every room.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let left = self.rooms.on_disconnect(connection).await;
        tracing::info!(connection_id = %connection, rooms_left = left.len(), "Connection closed");
    }

    /// Joins a room after the participant check. A failing check denies.
    pub async fn join(
        &self,
        connection: ConnectionId,
        user: &AuthenticatedUser,
        conversation_id: &ConversationId,
    ) -> Result<(), RealtimeError> {
        match self.participants.is_participant(&user.id, conversation_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(
                    connection_id = %connection,
                    user_id = %user.id,
                    conversation_id = %conversation_id,
                    "Join rejected: not a participant"
                );
                return Err(RealtimeError::NotParticipant);
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection,
                    conversation_id = %conversation_id,
                    error = %e,
                    "Participant check failed, denying join"
                );
                return Err(RealtimeError::CheckFailed);
            }
        }

        if !self.rooms.join(connection, conversation_id).await {
            tracing::warn!(
                connection_id = %connection,
                conversation_id = %conversation_id,
                "Join for a connection that is no longer registered"
            );
            return Err(RealtimeError::ConnectionClosed);
        }
        tracing::debug!(connection_id = %connection, conversation_id = %conversation_id, "Joined room");
        Ok(())
    }

    /// Leaves a room. Leaving a room never joined is a no-op.
    pub async fn leave(&self, connection: ConnectionId, conversation_id: &ConversationId) -> bool {
        let was_member = self.rooms.leave(connection, conversation_id).await;
        tracing::debug!(
            connection_id = %connection,
            conversation_id = %conversation_id,
            was_member,
            "Left room"
        );
        was_member
    }

    /// Fans out a message the CRUD layer has already committed.
    pub async fn message_created(&self, event: MessageEvent) -> Delivery {
        let published = self.publisher.publish(&event).await;
        if self.delivered_by_relay(published) {
            return Delivery::Bus;
        }
        let conversation_id = event.conversation_id.clone();
        Delivery::Local(
            self.rooms
                .broadcast(&conversation_id, ServerMessage::NewMessage(event))
                .await,
        )
    }

    /// Client-forwarded message (already persisted through the CRUD API).
    pub async fn send_message(
        &self,
        connection: ConnectionId,
        user: &AuthenticatedUser,
        request: SendMessageRequest,
    ) -> Result<Delivery, RealtimeError> {
        let SendMessageRequest {
            conversation_id,
            message,
        } = request;

        if message.conversation_id != conversation_id {
            return Err(RealtimeError::invalid("message belongs to another conversation"));
        }
        if message.sender_id != user.id {
            return Err(RealtimeError::invalid("senderId does not match the authenticated user"));
        }
        self.require_member(connection, &conversation_id).await?;

        Ok(self.message_created(message).await)
    }

    /// Broadcasts a typing indicator as the authenticated user.
    pub async fn typing(
        &self,
        connection: ConnectionId,
        user: &AuthenticatedUser,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<Delivery, RealtimeError> {
        self.require_member(connection, conversation_id).await?;

        let event = TypingEvent {
            conversation_id: conversation_id.clone(),
            user_id: user.id.clone(),
            is_typing,
        };
        let published = self.publisher.publish_typing(&event).await;
        if self.delivered_by_relay(published) {
            return Ok(Delivery::Bus);
        }
        Ok(Delivery::Local(
            self.rooms
                .broadcast(conversation_id, ServerMessage::UserTyping(event))
                .await,
        ))
    }

    /// Parses and handles one text frame from a client.
    pub async fn handle_text(&self, connection: ConnectionId, user: &AuthenticatedUser, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(connection, user, message).await,
            Err(e) => {
                tracing::debug!(connection_id = %connection, error = %e, "Unparseable client message");
                self.reply(connection, RealtimeError::invalid(e.to_string()).to_server_message())
                    .await;
            }
        }
    }

    /// Handles one client message, queuing any reply on the connection.
    pub async fn handle(&self, connection: ConnectionId, user: &AuthenticatedUser, message: ClientMessage) {
        let reply = match message {
            ClientMessage::JoinConversation(RoomRequest { conversation_id }) => {
                match self.join(connection, user, &conversation_id).await {
                    Ok(()) => Some(ServerMessage::Joined(RoomAck { conversation_id })),
                    Err(e) => Some(e.to_server_message()),
                }
            }
            ClientMessage::LeaveConversation(RoomRequest { conversation_id }) => {
                self.leave(connection, &conversation_id).await;
                Some(ServerMessage::Left(RoomAck { conversation_id }))
            }
            ClientMessage::SendMessage(request) => self
                .send_message(connection, user, request)
                .await
                .err()
                .map(|e| e.to_server_message()),
            ClientMessage::Typing(TypingRequest {
                conversation_id,
                user_id,
                is_typing,
            }) => {
                if user_id.as_ref().is_some_and(|claimed| *claimed != user.id) {
                    tracing::debug!(connection_id = %connection, "Ignoring client-supplied typing userId");
                }
                self.typing(connection, user, &conversation_id, is_typing)
                    .await
                    .err()
                    .map(|e| e.to_server_message())
            }
            ClientMessage::Ping => Some(ServerMessage::pong()),
        };

        if let Some(reply) = reply {
            self.reply(connection, reply).await;
        }
    }

    async fn reply(&self, connection: ConnectionId, message: ServerMessage) {
        self.rooms.send_to(connection, message).await;
    }

    async fn require_member(
        &self,
        connection: ConnectionId,
        conversation_id: &ConversationId,
    ) -> Result<(), RealtimeError> {
        if self.rooms.is_member(connection, conversation_id).await {
            Ok(())
        } else {
            Err(RealtimeError::NotJoined)
        }
    }

    fn delivered_by_relay(&self, published: bool) -> bool {
        published && self.relay_state() == RelayState::Subscribed
    }
}
