//! WebSocket message protocol.
//!
//! JSON text frames tagged by `type`, camelCase fields:
//! - Client → Server: join/leave a conversation room, send a message,
//!   typing indicator, ping
//! - Server → Client: connection ack, room acks, relayed events, errors, pong

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConnectionId, ConversationId, Timestamp, UserId};
use crate::domain::messaging::{MessageEvent, TypingEvent};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    Connected(ConnectedMessage),

    /// Room join accepted.
    Joined(RoomAck),

    /// Room left.
    Left(RoomAck),

    /// A chat message relayed to the room.
    NewMessage(MessageEvent),

    /// A typing indicator relayed to the room.
    UserTyping(TypingEvent),

    /// A client request was rejected.
    Error(ErrorMessage),

    /// Reply to a client `ping`.
    Pong(PongMessage),
}

impl ServerMessage {
    /// Wire name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected(_) => "connected",
            ServerMessage::Joined(_) => "joined",
            ServerMessage::Left(_) => "left",
            ServerMessage::NewMessage(_) => "new_message",
            ServerMessage::UserTyping(_) => "user_typing",
            ServerMessage::Error(_) => "error",
            ServerMessage::Pong(_) => "pong",
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn pong() -> Self {
        ServerMessage::Pong(PongMessage {
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAck {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinConversation(RoomRequest),
    LeaveConversation(RoomRequest),
    SendMessage(SendMessageRequest),
    Typing(TypingRequest),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub conversation_id: ConversationId,
}

/// A message the CRUD layer already persisted, forwarded for fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: ConversationId,
    pub message: MessageEvent,
}

/// Typing indicator. `userId` is accepted for compatibility but the server
/// always stamps the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub is_typing: bool,
}
