//! Bus used when no broker is configured.
//!
//! Every call fails with `NotConfigured`, so publishes report failure and the
//! relay settles in `Disconnected` without retrying.

use async_trait::async_trait;

use crate::ports::{BusError, BusStream, MessageBus};

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMessageBus;

#[async_trait]
impl MessageBus for DisabledMessageBus {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), BusError> {
        Err(BusError::NotConfigured)
    }

    async fn psubscribe(&self, _patterns: &[String]) -> Result<BusStream, BusError> {
        Err(BusError::NotConfigured)
    }
}
