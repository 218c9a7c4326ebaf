//! Top-level router: health, WebSocket endpoint, 404 fallback and layers.

use axum::{
    http::{HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::adapters::websocket::{websocket_router, WebSocketState};
use crate::config::ServerConfig;

use super::health::{health_router, HealthState};

/// Assembles the application router.
///
/// The request timeout applies to plain HTTP routes only; upgraded sockets
/// outlive it.
pub fn app_router(server: &ServerConfig, ws: WebSocketState, health: HealthState) -> Router {
    let http_routes = health_router()
        .with_state(health)
        .layer(TimeoutLayer::new(server.request_timeout()));

    Router::new()
        .merge(http_routes)
        .merge(websocket_router().with_state(ws))
        .fallback(not_found)
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
}

/// Any origin when none are configured.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not Found",
            "message": format!("Route {} {} not found", method, uri.path()),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::adapters::auth::MockSessionValidator;
    use crate::adapters::bus::InMemoryMessageBus;
    use crate::adapters::participants::InMemoryParticipantChecker;
    use crate::adapters::websocket::{RealtimeHub, RelayState, RoomRegistry};
    use crate::application::MessagePublisher;

    fn app(server: &ServerConfig) -> Router {
        let (_tx, relay_state) = watch::channel(RelayState::Disconnected);
        let hub = RealtimeHub::new(
            Arc::new(RoomRegistry::new()),
            MessagePublisher::new(Arc::new(InMemoryMessageBus::new())),
            Arc::new(InMemoryParticipantChecker::allow_all()),
            relay_state.clone(),
            8,
        );
        let ws = WebSocketState::new(Arc::new(hub), Arc::new(MockSessionValidator::new()), None);
        app_router(server, ws, HealthState::new(None, relay_state))
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = app(&ServerConfig::default())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["message"], "Route GET /nope not found");
    }

    #[tokio::test]
    async fn health_and_ws_are_routed() {
        let server = ServerConfig::default();

        let health = app(&server)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let ws = app(&server)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ws.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn configured_origin_is_echoed() {
        let server = ServerConfig {
            cors_origins: Some("https://app.example.com, https://admin.example.com".to_string()),
            ..ServerConfig::default()
        };

        let response = app(&server)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://admin.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://admin.example.com"
        );
    }

    #[tokio::test]
    async fn any_origin_when_unset() {
        let response = app(&ServerConfig::default())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
