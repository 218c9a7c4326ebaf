//! Bus relay: turns bus deliveries into room emissions.
//!
//! # Lifecycle
//!
//! ```text
//!   Disconnected ──run()──▶ Connecting ──psubscribe ok──▶ Subscribed
//!                              │  ▲                           │
//!                  retry with  │  └──── stream ended ─────────┘
//!                  backoff     │
//!                              ▼ retries exhausted / not configured / shutdown
//!                         Disconnected (for the rest of the process)
//! ```
//!
//! Losing a subscription that was up and working starts a new outage with a
//! fresh retry budget. A subscription that ends right after it opened counts
//! as one more failed attempt, so a flapping broker still exhausts the budget.
//!
//! Each delivery is routed by channel family: `conversation:*` decodes a
//! `MessageEvent` and emits `new_message`, `typing:*` decodes a
//! `TypingEvent` and emits `user_typing`. Malformed payloads are logged and
//! dropped.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ReconnectPolicy;
use crate::domain::foundation::ConversationId;
use crate::domain::messaging::{parse_channel, ChannelFamily, MessageEvent, TypingEvent};
use crate::ports::{BusDelivery, BusError, BusStream, MessageBus};

use super::messages::ServerMessage;
use super::rooms::RoomRegistry;

/// Subscription state of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Disconnected => "disconnected",
            RelayState::Connecting => "connecting",
            RelayState::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a subscription ended.
enum Subscription {
    Stopped,
    Lost { healthy: bool },
}

pub struct BusRelay {
    bus: Arc<dyn MessageBus>,
    rooms: Arc<RoomRegistry>,
    policy: ReconnectPolicy,
    state: watch::Sender<RelayState>,
}

impl BusRelay {
    pub fn new(bus: Arc<dyn MessageBus>, rooms: Arc<RoomRegistry>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(RelayState::Disconnected);
        Self {
            bus,
            rooms,
            policy,
            state,
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// Spawns [`BusRelay::run`] on the runtime.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Runs until shutdown is signalled (or its sender dropped), or until the
    /// bus is given up on. Always ends in `Disconnected`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let patterns: Vec<String> = ChannelFamily::ALL.iter().map(|f| f.pattern()).collect();
        // Failures in the current outage.
        let mut attempt = 0;

        while !*shutdown.borrow() {
            self.set_state(RelayState::Connecting);

            let error = match self.bus.psubscribe(&patterns).await {
                Ok(stream) => {
                    self.set_state(RelayState::Subscribed);
                    tracing::info!(?patterns, "Relay subscribed to message bus");

                    match self.pump(stream, &mut shutdown).await {
                        Subscription::Stopped => break,
                        Subscription::Lost { healthy: true } => {
                            tracing::warn!("Bus subscription lost, reconnecting");
                            attempt = 0;
                            continue;
                        }
                        Subscription::Lost { healthy: false } => {
                            BusError::unavailable("subscription ended right after it was opened")
                        }
                    }
                }
                Err(BusError::NotConfigured) => {
                    tracing::info!("Message bus not configured, real-time delivery is local only");
                    break;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(error = %e, "Bus subscribe failed permanently");
                    break;
                }
                Err(e) => e,
            };

            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                tracing::error!(
                    attempts = attempt,
                    error = %error,
                    "Giving up on message bus, cross-process delivery disabled"
                );
                break;
            };

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Bus subscribe failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }

        self.set_state(RelayState::Disconnected);
        tracing::info!("Relay stopped");
    }

    /// Dispatches deliveries until the stream ends or shutdown.
    ///
    /// A lost subscription counts as healthy if it delivered anything or
    /// stayed up for at least the policy's maximum delay; otherwise it
    /// counts against the current outage like a failed connect.
    async fn pump(&self, mut stream: BusStream, shutdown: &mut watch::Receiver<bool>) -> Subscription {
        let opened = Instant::now();
        let mut delivered_any = false;

        loop {
            tokio::select! {
                _ = stopped(shutdown) => return Subscription::Stopped,
                next = stream.next() => match next {
                    Some(delivery) => {
                        delivered_any = true;
                        self.dispatch(delivery).await;
                    }
                    None => {
                        let healthy = delivered_any || opened.elapsed() >= self.policy.max_delay;
                        return Subscription::Lost { healthy };
                    }
                },
            }
        }
    }

    /// Routes one delivery to the matching room.
    ///
    /// Returns the number of connections it was emitted to.
    pub async fn dispatch(&self, delivery: BusDelivery) -> usize {
        let Some(channel) = parse_channel(&delivery.channel) else {
            tracing::debug!(channel = %delivery.channel, "Ignoring delivery on unknown channel");
            return 0;
        };
        let Some(payload) = delivery.payload_str() else {
            tracing::warn!(channel = %delivery.channel, "Dropping non UTF-8 payload");
            return 0;
        };

        let decoded = match channel.family {
            ChannelFamily::Conversation => decode_message(payload),
            ChannelFamily::Typing => decode_typing(payload),
        };

        match decoded {
            Ok((conversation_id, message)) if conversation_id == channel.conversation_id => {
                let delivered = self.rooms.broadcast(&conversation_id, message).await;
                tracing::debug!(
                    channel = %delivery.channel,
                    conversation_id = %conversation_id,
                    delivered,
                    "Relayed bus delivery"
                );
                delivered
            }
            Ok((conversation_id, _)) => {
                tracing::warn!(
                    channel = %delivery.channel,
                    conversation_id = %conversation_id,
                    "Dropping payload addressed to another conversation"
                );
                0
            }
            Err(e) => {
                tracing::warn!(channel = %delivery.channel, error = %e, "Dropping malformed payload");
                0
            }
        }
    }

    fn set_state(&self, state: RelayState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Relay state changed");
        }
    }
}

fn decode_message(payload: &str) -> Result<(ConversationId, ServerMessage), serde_json::Error> {
    let event = MessageEvent::from_payload(payload)?;
    Ok((event.conversation_id.clone(), ServerMessage::NewMessage(event)))
}

fn decode_typing(payload: &str) -> Result<(ConversationId, ServerMessage), serde_json::Error> {
    let event = TypingEvent::from_payload(payload)?;
    Ok((event.conversation_id.clone(), ServerMessage::UserTyping(event)))
}

/// Resolves once shutdown is requested or the signal sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
