//! Social Realtime server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use social_realtime::adapters::auth::JwtSessionValidator;
use social_realtime::adapters::bus::{DisabledMessageBus, RedisMessageBus};
use social_realtime::adapters::http::{app_router, HealthState};
use social_realtime::adapters::participants::PostgresParticipantChecker;
use social_realtime::adapters::websocket::{BusRelay, RealtimeHub, RoomRegistry, WebSocketState};
use social_realtime::application::MessagePublisher;
use social_realtime::config::{AppConfig, ServerConfig};
use social_realtime::ports::MessageBus;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        redis = %config.redis.redacted_url(),
        "Starting social-realtime"
    );

    let db = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    // A broken bus configuration degrades to local-only delivery.
    let bus: Arc<dyn MessageBus> = if config.redis.is_configured() {
        match RedisMessageBus::from_config(&config.redis) {
            Ok(bus) => Arc::new(bus),
            Err(e) => {
                tracing::error!(error = %e, "Invalid Redis configuration, real-time stays local");
                Arc::new(DisabledMessageBus)
            }
        }
    } else {
        tracing::warn!("Redis not configured, real-time delivery is local to this process");
        Arc::new(DisabledMessageBus)
    };

    let rooms = Arc::new(RoomRegistry::new());
    let relay = Arc::new(BusRelay::new(
        bus.clone(),
        rooms.clone(),
        config.redis.reconnect_policy(),
    ));
    let relay_state = relay.subscribe_state();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_task = relay.spawn(shutdown_rx);

    let hub = Arc::new(RealtimeHub::new(
        rooms,
        MessagePublisher::new(bus),
        Arc::new(PostgresParticipantChecker::new(db.clone())),
        relay_state.clone(),
        config.realtime.connection_queue_capacity,
    ));
    let ws_state = WebSocketState::new(
        hub,
        Arc::new(JwtSessionValidator::new(&config.auth)),
        config.realtime.heartbeat_interval(),
    );
    let app = app_router(&config.server, ws_state, HealthState::new(Some(db.clone()), relay_state));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_task.await {
        tracing::warn!(error = %e, "Relay task ended abnormally");
    }
    db.close().await;

    Ok(())
}

/// `RUST_LOG` overrides the configured level; production logs are JSON.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
