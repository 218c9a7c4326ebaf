//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `SOCIAL_REALTIME`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use social_realtime::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod auth;
mod database;
mod error;
mod realtime;
mod redis;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use realtime::RealtimeConfig;
pub use self::redis::{ReconnectPolicy, RedisConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (participant lookups)
    pub database: DatabaseConfig,

    /// Redis configuration (message bus); optional
    #[serde(default)]
    pub redis: RedisConfig,

    /// Access token verification
    pub auth: AuthConfig,

    /// WebSocket connection tuning
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SOCIAL_REALTIME` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `SOCIAL_REALTIME__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SOCIAL_REALTIME__REDIS__URL=...` -> `redis.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SOCIAL_REALTIME")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.realtime.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("SOCIAL_REALTIME__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("SOCIAL_REALTIME__AUTH__JWT_SECRET", "test-secret");
    }

    fn clear_env() {
        for key in [
            "SOCIAL_REALTIME__DATABASE__URL",
            "SOCIAL_REALTIME__AUTH__JWT_SECRET",
            "SOCIAL_REALTIME__REDIS__URL",
            "SOCIAL_REALTIME__SERVER__PORT",
            "SOCIAL_REALTIME__SERVER__ENVIRONMENT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SOCIAL_REALTIME__REDIS__URL", "redis://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.auth.jwt_secret.expose_secret(), "test-secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_and_realtime_are_optional() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(!config.redis.is_configured());
        assert_eq!(config.realtime.connection_queue_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SOCIAL_REALTIME__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::JwtSecretTooShort));
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SOCIAL_REALTIME__SERVER__PORT", "8080");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 8080);
    }

    #[test]
    fn test_missing_database_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SOCIAL_REALTIME__AUTH__JWT_SECRET", "test-secret");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
