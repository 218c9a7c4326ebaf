//! Conversation room registry.
//!
//! Tracks which live connections joined which conversation rooms in this
//! process. Purely a membership index: authorization happens before `join`
//! is called.
//!
//! # Architecture
//!
//! ```text
//! Room: conversation c1    Room: conversation c2
//! ├── conn-a               ├── conn-a
//! └── conn-b               └── conn-c
//! ```
//!
//! Membership is per connection, never per user. Each connection owns a
//! bounded outbound queue; room broadcasts enqueue without awaiting, so a
//! slow client only loses its own emissions.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};

use crate::domain::foundation::{ConnectionId, ConversationId};

use super::messages::ServerMessage;

struct ConnectionEntry {
    sink: mpsc::Sender<ServerMessage>,
    rooms: HashSet<ConversationId>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<ConversationId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

/// Room membership for this process's connections.
///
/// Uses `RwLock` since broadcasts (reads) vastly outnumber joins and
/// leaves (writes).
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection and its outbound queue.
    pub async fn register(&self, connection: ConnectionId, sink: mpsc::Sender<ServerMessage>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            connection,
            ConnectionEntry {
                sink,
                rooms: HashSet::new(),
            },
        );
    }

    /// Adds a connection to a room. Idempotent.
    ///
    /// Returns `false` if the connection is not registered (already gone).
    pub async fn join(&self, connection: ConnectionId, conversation_id: &ConversationId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.get_mut(&connection) else {
            return false;
        };
        entry.rooms.insert(conversation_id.clone());
        inner
            .rooms
            .entry(conversation_id.clone())
            .or_default()
            .insert(connection);
        true
    }

    /// Removes a connection from a room; empty rooms are dropped.
    ///
    /// Returns whether the connection was a member.
    pub async fn leave(&self, connection: ConnectionId, conversation_id: &ConversationId) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.connections.get_mut(&connection) {
            entry.rooms.remove(conversation_id);
        }
        remove_member(&mut inner.rooms, conversation_id, connection)
    }

    /// Forgets a connection and leaves every room it was in.
    ///
    /// Returns the rooms it left.
    pub async fn on_disconnect(&self, connection: ConnectionId) -> Vec<ConversationId> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.remove(&connection) else {
            return Vec::new();
        };
        for conversation_id in &entry.rooms {
            remove_member(&mut inner.rooms, conversation_id, connection);
        }
        entry.rooms.into_iter().collect()
    }

    pub async fn members_of(&self, conversation_id: &ConversationId) -> HashSet<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_member(&self, connection: ConnectionId, conversation_id: &ConversationId) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(conversation_id)
            .is_some_and(|members| members.contains(&connection))
    }

    /// Emits a message to every member of a room.
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn broadcast(&self, conversation_id: &ConversationId, message: ServerMessage) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(conversation_id) else {
            return 0;
        };

        let mut delivered = 0;
        for connection in members {
            if let Some(entry) = inner.connections.get(connection) {
                if enqueue(*connection, &entry.sink, message.clone()) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Emits a message to one connection, regardless of rooms.
    pub async fn send_to(&self, connection: ConnectionId, message: ServerMessage) -> bool {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection)
            .is_some_and(|entry| enqueue(connection, &entry.sink, message))
    }
}

fn remove_member(
    rooms: &mut HashMap<ConversationId, HashSet<ConnectionId>>,
    conversation_id: &ConversationId,
    connection: ConnectionId,
) -> bool {
    let Some(members) = rooms.get_mut(conversation_id) else {
        return false;
    };
    let removed = members.remove(&connection);
    if members.is_empty() {
        rooms.remove(conversation_id);
    }
    removed
}

fn enqueue(connection: ConnectionId, sink: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> bool {
    match sink.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            tracing::warn!(
                connection_id = %connection,
                kind = message.kind(),
                "Outbound queue full, dropping emission"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!(connection_id = %connection, "Connection queue closed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> ConversationId {
        ConversationId::new(id).unwrap()
    }

    async fn connected(registry: &RoomRegistry, capacity: usize) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let connection = ConnectionId::new();
        registry.register(connection, tx).await;
        (connection, rx)
    }

    #[tokio::test]
    async fn join_adds_membership() {
        let registry = RoomRegistry::new();
        let (conn, _rx) = connected(&registry, 8).await;

        assert!(registry.join(conn, &room("c1")).await);

        assert!(registry.is_member(conn, &room("c1")).await);
        assert_eq!(registry.members_of(&room("c1")).await, HashSet::from([conn]));
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let (conn, mut rx) = connected(&registry, 8).await;

        registry.join(conn, &room("c1")).await;
        registry.join(conn, &room("c1")).await;

        assert_eq!(registry.broadcast(&room("c1"), ServerMessage::pong()).await, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregistered_connection_cannot_join() {
        let registry = RoomRegistry::new();
        assert!(!registry.join(ConnectionId::new(), &room("c1")).await);
        assert!(registry.members_of(&room("c1")).await.is_empty());
    }

    #[tokio::test]
    async fn leave_removes_membership_and_empty_room() {
        let registry = RoomRegistry::new();
        let (conn, _rx) = connected(&registry, 8).await;
        registry.join(conn, &room("c1")).await;

        assert!(registry.leave(conn, &room("c1")).await);
        assert!(!registry.leave(conn, &room("c1")).await);

        assert!(!registry.is_member(conn, &room("c1")).await);
        assert!(registry.inner.read().await.rooms.is_empty());
    }

    #[tokio::test]
    async fn disconnect_leaves_every_room() {
        let registry = RoomRegistry::new();
        let (conn, _rx) = connected(&registry, 8).await;
        let (other, _other_rx) = connected(&registry, 8).await;
        registry.join(conn, &room("c1")).await;
        registry.join(conn, &room("c2")).await;
        registry.join(other, &room("c2")).await;

        let mut left = registry.on_disconnect(conn).await;
        left.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        assert_eq!(left, vec![room("c1"), room("c2")]);
        assert!(!registry.send_to(conn, ServerMessage::pong()).await);
        assert!(registry.send_to(other, ServerMessage::pong()).await);
        assert_eq!(registry.members_of(&room("c2")).await, HashSet::from([other]));
        assert!(registry.members_of(&room("c1")).await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_room_members() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = connected(&registry, 8).await;
        let (b, mut rx_b) = connected(&registry, 8).await;
        let (c, mut rx_c) = connected(&registry, 8).await;
        registry.join(a, &room("c1")).await;
        registry.join(b, &room("c1")).await;
        registry.join(c, &room("c2")).await;

        let delivered = registry.broadcast(&room("c1"), ServerMessage::pong()).await;

        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_is_noop() {
        let registry = RoomRegistry::new();
        assert_eq!(registry.broadcast(&room("nobody"), ServerMessage::pong()).await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_that_connection() {
        let registry = RoomRegistry::new();
        let (slow, mut slow_rx) = connected(&registry, 1).await;
        let (fast, mut fast_rx) = connected(&registry, 8).await;
        registry.join(slow, &room("c1")).await;
        registry.join(fast, &room("c1")).await;

        assert_eq!(registry.broadcast(&room("c1"), ServerMessage::pong()).await, 2);
        assert_eq!(registry.broadcast(&room("c1"), ServerMessage::pong()).await, 1);

        assert!(slow_rx.try_recv().is_ok());
        assert!(slow_rx.try_recv().is_err());
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_targets_single_connection() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = connected(&registry, 8).await;
        let (_b, mut rx_b) = connected(&registry, 8).await;

        assert!(registry.send_to(a, ServerMessage::pong()).await);
        assert!(!registry.send_to(ConnectionId::new(), ServerMessage::pong()).await);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
