//! Health endpoint.
//!
//! Healthy means the database answers. The relay state is reported but never
//! makes the process unhealthy: without the bus, rooms still get local events.

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;

use crate::adapters::websocket::RelayState;
use crate::domain::foundation::Timestamp;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct HealthState {
    /// `None` when no pool is attached (tests, bus-only deployments).
    pub db: Option<PgPool>,
    pub relay_state: watch::Receiver<RelayState>,
    pub started_at: Instant,
}

impl HealthState {
    pub fn new(db: Option<PgPool>, relay_state: watch::Receiver<RelayState>) -> Self {
        Self {
            db,
            relay_state,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
    NotConfigured,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: Timestamp,
    pub uptime_secs: u64,
    pub database: DatabaseStatus,
    pub realtime: RelayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let database = check_database(state.db.as_ref()).await;
    let healthy = database != DatabaseStatus::Disconnected;

    let response = HealthResponse {
        status: if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        timestamp: Timestamp::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        database,
        realtime: *state.relay_state.borrow(),
        error: (!healthy).then(|| "Database connection failed".to_string()),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn check_database(db: Option<&PgPool>) -> DatabaseStatus {
    let Some(pool) = db else {
        return DatabaseStatus::NotConfigured;
    };

    match tokio::time::timeout(DB_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => DatabaseStatus::Connected,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Health check database query failed");
            DatabaseStatus::Disconnected
        }
        Err(_) => {
            tracing::error!("Health check database query timed out");
            DatabaseStatus::Disconnected
        }
    }
}

pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health))
}
