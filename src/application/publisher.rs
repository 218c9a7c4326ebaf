//! MessagePublisher - pushes committed events onto the bus.
//!
//! Publishing is best-effort and decoupled from durability: the CRUD write
//! has already succeeded, so failures are logged and reported as `false`,
//! never raised. There is no local emission here; each process's relay
//! receives its own publishes.

use std::sync::Arc;

use crate::domain::messaging::{channel_for, typing_channel_for, MessageEvent, TypingEvent};
use crate::ports::{BusError, MessageBus};

#[derive(Clone)]
pub struct MessagePublisher {
    bus: Arc<dyn MessageBus>,
}

impl MessagePublisher {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publishes a message event on its conversation channel.
    pub async fn publish(&self, event: &MessageEvent) -> bool {
        let channel = channel_for(&event.conversation_id);
        let payload = event.to_payload().map_err(|e| BusError::Encode(e.to_string()));
        self.send(&channel, payload).await
    }

    /// Publishes a typing indicator on its typing channel.
    pub async fn publish_typing(&self, event: &TypingEvent) -> bool {
        let channel = typing_channel_for(&event.conversation_id);
        let payload = event.to_payload().map_err(|e| BusError::Encode(e.to_string()));
        self.send(&channel, payload).await
    }

    async fn send(&self, channel: &str, payload: Result<String, BusError>) -> bool {
        let result = match payload {
            Ok(payload) => self.bus.publish(channel, &payload).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!(channel, "Published to bus");
                true
            }
            Err(BusError::NotConfigured) => {
                tracing::debug!(channel, "Bus not configured, skipping publish");
                false
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "Bus publish failed");
                false
            }
        }
    }
}
