//! Redis (message bus) configuration
//!
//! The bus is optional. With no URL the process runs without cross-process
//! fan-out: publishes report failure and the relay stays disconnected.
//!
//! Two URL shapes are accepted:
//! - standard `redis://` / `rediss://` URLs
//! - Azure connection strings: `host:port,password=key,ssl=True,abortConnect=False`

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis URL or Azure connection string; empty disables the bus
    #[serde(default)]
    pub url: String,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (self-signed broker certs)
    #[serde(default)]
    pub tls_insecure: bool,

    /// Reconnect attempts after the first failure before giving up
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,

    /// Linear backoff step in milliseconds
    #[serde(default = "default_reconnect_step_ms")]
    pub reconnect_step_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

/// Bounded reconnection policy for the bus subscription.
///
/// Retry `n` (1-based) waits `min(n * step, max_delay)`; once `n` exceeds
/// `max_retries` the caller gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub step: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt`, or `None` when retries are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        Some(self.step.saturating_mul(attempt).min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        RedisConfig::default().reconnect_policy()
    }
}

impl RedisConfig {
    /// Whether a broker is configured at all
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reconnect policy derived from the configured limits
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries: self.reconnect_max_retries,
            step: Duration::from_millis(self.reconnect_step_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
        }
    }

    /// Normalized `redis://` / `rediss://` URL for the client.
    pub fn connection_url(&self) -> Result<String, ValidationError> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }

        let url = if raw.starts_with("redis://") || raw.starts_with("rediss://") {
            raw.to_string()
        } else {
            parse_azure_connection_string(raw)?
        };

        if self.tls_insecure && url.starts_with("rediss://") && !url.contains('#') {
            return Ok(format!("{url}#insecure"));
        }
        Ok(url)
    }

    /// URL with any password masked, for logs
    pub fn redacted_url(&self) -> String {
        match self.connection_url() {
            Ok(url) => redact_password(&url),
            Err(_) => "<invalid>".to_string(),
        }
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.is_configured() {
            return Ok(());
        }
        self.connection_url()?;
        if self.reconnect_step_ms == 0 || self.reconnect_max_delay_ms < self.reconnect_step_ms {
            return Err(ValidationError::InvalidReconnectPolicy);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout(),
            tls_insecure: false,
            reconnect_max_retries: default_reconnect_max_retries(),
            reconnect_step_ms: default_reconnect_step_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_reconnect_max_retries() -> u32 {
    3
}

fn default_reconnect_step_ms() -> u64 {
    100
}

fn default_reconnect_max_delay_ms() -> u64 {
    3000
}

fn parse_azure_connection_string(raw: &str) -> Result<String, ValidationError> {
    let mut parts = raw.split(',').map(str::trim);
    let host_port = parts
        .next()
        .filter(|hp| !hp.is_empty() && !hp.contains('='))
        .ok_or(ValidationError::InvalidRedisUrl)?;

    let mut password = None;
    let mut ssl = false;
    for part in parts {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "password" => password = Some(value.trim()),
            "ssl" => ssl = value.trim().eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    let scheme = if ssl { "rediss" } else { "redis" };
    Ok(match password.filter(|p| !p.is_empty()) {
        Some(pw) => format!("{scheme}://:{}@{host_port}", encode_userinfo(pw)),
        None => format!("{scheme}://{host_port}"),
    })
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_userinfo(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn redact_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, host)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}
