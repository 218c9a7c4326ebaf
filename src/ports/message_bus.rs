//! MessageBus port - the process-wide publish/subscribe medium.
//!
//! Every server process publishes onto, and pattern-subscribes to, the same
//! bus. Adapters: Redis (production), in-memory (tests and single-process
//! runs) and a disabled bus for deployments without a broker.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// One message received from a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDelivery {
    /// Concrete channel the message was published on.
    pub channel: String,
    /// Raw payload bytes (UTF-8 JSON when well-formed).
    pub payload: Vec<u8>,
}

impl BusDelivery {
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Stream of deliveries. Ends when the underlying subscription is lost.
pub type BusStream = BoxStream<'static, BusDelivery>;

/// Errors raised by bus adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// No broker is configured for this process.
    #[error("Message bus not configured")]
    NotConfigured,

    /// Connect, publish or subscribe failed.
    #[error("Message bus unavailable: {0}")]
    Unavailable(String),

    /// The event could not be serialized.
    #[error("Failed to encode bus payload: {0}")]
    Encode(String),
}

impl BusError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// True when reconnecting might help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Unavailable(_))
    }
}

/// Port for the publish/subscribe bus.
///
/// Implementations own their connections and serialize their own I/O, so a
/// single instance is shared by the publisher and the relay.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a UTF-8 payload on a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Open a fresh subscription for the given glob patterns.
    ///
    /// Each call establishes a new connection; the returned stream ends when
    /// that connection drops.
    async fn psubscribe(&self, patterns: &[String]) -> Result<BusStream, BusError>;
}
