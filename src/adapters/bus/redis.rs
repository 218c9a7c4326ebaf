//! Redis pub/sub message bus for multi-process deployments.
//!
//! Publishing goes through one multiplexed connection, opened lazily and
//! reopened after a failed or timed-out publish. Connects and publishes are
//! both bounded by the configured timeout. Each `psubscribe` opens a dedicated
//! pub/sub connection whose message stream ends when Redis drops it.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::config::RedisConfig;
use crate::ports::{BusDelivery, BusError, BusStream, MessageBus};

pub struct RedisMessageBus {
    client: redis::Client,
    timeout: Duration,
    publisher: Mutex<Option<MultiplexedConnection>>,
}

impl RedisMessageBus {
    /// Builds the client. No connection is opened until first use.
    pub fn from_config(config: &RedisConfig) -> Result<Self, BusError> {
        if !config.is_configured() {
            return Err(BusError::NotConfigured);
        }
        let url = config
            .connection_url()
            .map_err(|e| BusError::unavailable(e.to_string()))?;
        let client = redis::Client::open(url).map_err(|e| BusError::unavailable(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            publisher: Mutex::new(None),
        })
    }

    async fn publish_connection(&self) -> Result<MultiplexedConnection, BusError> {
        let mut cached = self.publisher.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| BusError::unavailable("connect timed out"))?
        .map_err(|e| BusError::unavailable(e.to_string()))?;

        tracing::info!("Redis publisher connected");
        *cached = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.publish_connection().await?;

        let error = match tokio::time::timeout(self.timeout, conn.publish::<_, _, ()>(channel, payload)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => BusError::unavailable(e.to_string()),
            Err(_) => BusError::unavailable("publish timed out"),
        };

        // Force a reconnect on the next publish.
        self.publisher.lock().await.take();
        Err(error)
    }

    async fn psubscribe(&self, patterns: &[String]) -> Result<BusStream, BusError> {
        let mut pubsub = tokio::time::timeout(self.timeout, self.client.get_async_pubsub())
            .await
            .map_err(|_| BusError::unavailable("connect timed out"))?
            .map_err(|e| BusError::unavailable(e.to_string()))?;

        tokio::time::timeout(self.timeout, pubsub.psubscribe(patterns))
            .await
            .map_err(|_| BusError::unavailable("psubscribe timed out"))?
            .map_err(|e| BusError::unavailable(e.to_string()))?;

        let stream = pubsub
            .into_on_message()
            .map(|msg| BusDelivery::new(msg.get_channel_name(), msg.get_payload_bytes()));
        Ok(stream.boxed())
    }
}
