//! Real-time connection settings

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Per-connection tuning for the WebSocket layer
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound queue depth per connection; emissions beyond it are dropped
    #[serde(default = "default_queue_capacity")]
    pub connection_queue_capacity: usize,

    /// Seconds between server Ping frames; 0 disables the heartbeat
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl RealtimeConfig {
    /// Heartbeat interval, `None` when disabled
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.connection_queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connection_queue_capacity: default_queue_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}

fn default_heartbeat_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.connection_queue_capacity, 64);
        assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_heartbeat_disables() {
        let config = RealtimeConfig {
            heartbeat_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.heartbeat_interval(), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RealtimeConfig {
            connection_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }
}
