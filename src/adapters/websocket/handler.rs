//! WebSocket upgrade handler for real-time conversation connections.
//!
//! Connection lifecycle:
//! 1. Authenticate the token (header or query) before upgrading
//! 2. Register the connection with the hub
//! 3. Pump the outbound queue to the socket, with periodic Ping frames
//! 4. Feed inbound text frames to the hub
//! 5. Leave every room on disconnect

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

use super::hub::RealtimeHub;
use super::messages::ServerMessage;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<RealtimeHub>,
    pub sessions: Arc<dyn SessionValidator>,
    /// Interval between server Ping frames; `None` disables them.
    pub heartbeat: Option<Duration>,
}

impl WebSocketState {
    pub fn new(hub: Arc<RealtimeHub>, sessions: Arc<dyn SessionValidator>, heartbeat: Option<Duration>) -> Self {
        Self {
            hub,
            sessions,
            heartbeat,
        }
    }
}

/// Query parameters for the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsConnectParams {
    /// Access token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
///
/// # Security
///
/// The token is validated before the upgrade; a bad or missing token gets a
/// 401 JSON response and no socket.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    headers: HeaderMap,
    Query(params): Query<WsConnectParams>,
    State(state): State<WebSocketState>,
) -> Response {
    let user = match authenticate(state.sessions.as_ref(), &headers, params.token.as_deref()).await {
        Ok(user) => user,
        Err(e) => return auth_rejection(&e),
    };

    let Some(ws) = ws else {
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(serde_json::json!({
                "error": "Upgrade Required",
                "message": "This endpoint only accepts WebSocket connections"
            })),
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Resolves the caller from `Authorization: Bearer` or the `token` query parameter.
///
/// The header wins when both are present.
pub async fn authenticate(
    sessions: &dyn SessionValidator,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)
        .or(query_token)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    sessions.validate(token).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn auth_rejection(error: &AuthError) -> Response {
    let (status, message) = match error {
        AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing access token"),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
        AuthError::ServiceUnavailable(msg) => {
            tracing::error!("Auth service unavailable: {}", msg);
            (StatusCode::SERVICE_UNAVAILABLE, "Authentication service unavailable")
        }
    };

    (
        status,
        Json(serde_json::json!({
            "error": message,
            "code": "AUTH_ERROR"
        })),
    )
        .into_response()
}

/// Runs for the lifetime of an established connection.
async fn handle_socket(socket: WebSocket, user: AuthenticatedUser, state: WebSocketState) {
    let (connection, mut outbound) = state.hub.connect(&user).await;
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = {
        let mut heartbeat = state.heartbeat.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = outbound.recv() => {
                        let Some(message) = message else { break };
                        if let Err(e) = send_message(&mut sender, &message).await {
                            tracing::debug!(connection_id = %connection, "Send error, closing connection: {}", e);
                            break;
                        }
                    }
                    _ = tick(&mut heartbeat) => {
                        if let Err(e) = sender.send(Message::Ping(Vec::new())).await {
                            tracing::debug!(connection_id = %connection, "Heartbeat failed: {}", e);
                            break;
                        }
                    }
                }
            }
        })
    };

    let mut recv_task = {
        let hub = state.hub.clone();
        let user = user.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => hub.handle_text(connection, &user, &text).await,
                    Ok(Message::Binary(_)) => {
                        tracing::warn!(connection_id = %connection, "Received unsupported binary message");
                    }
                    // Protocol-level ping/pong is answered by axum.
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        tracing::debug!(connection_id = %connection, "Client sent close frame");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %connection, "Receive error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.disconnect(connection).await;
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(kind = msg.kind(), "Failed to encode server message: {}", e);
            Ok(())
        }
    }
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::adapters::auth::MockSessionValidator;
    use crate::adapters::bus::InMemoryMessageBus;
    use crate::adapters::participants::InMemoryParticipantChecker;
    use crate::adapters::websocket::{RelayState, RoomRegistry};
    use crate::application::MessagePublisher;

    fn state(sessions: MockSessionValidator) -> WebSocketState {
        let (_tx, state_rx) = watch::channel(RelayState::Disconnected);
        let hub = RealtimeHub::new(
            Arc::new(RoomRegistry::new()),
            MessagePublisher::new(Arc::new(InMemoryMessageBus::new())),
            Arc::new(InMemoryParticipantChecker::allow_all()),
            state_rx,
            8,
        );
        WebSocketState::new(Arc::new(hub), Arc::new(sessions), None)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn header_token_wins_over_query() {
        let sessions = MockSessionValidator::new()
            .with_test_user("header-token", "alice")
            .with_test_user("query-token", "bob");
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer header-token".parse().unwrap());

        let user = authenticate(&sessions, &headers, Some("query-token")).await.unwrap();
        assert_eq!(user.id.as_str(), "alice");
    }

    #[tokio::test]
    async fn query_token_is_accepted() {
        let sessions = MockSessionValidator::new().with_test_user("query-token", "bob");

        let user = authenticate(&sessions, &HeaderMap::new(), Some("query-token")).await.unwrap();
        assert_eq!(user.id.as_str(), "bob");
    }

    #[tokio::test]
    async fn empty_token_is_missing() {
        let sessions = MockSessionValidator::new();
        let result = authenticate(&sessions, &HeaderMap::new(), Some("")).await;
        assert_eq!(result, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_upgrade() {
        let app = websocket_router().with_state(state(MockSessionValidator::new()));

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "AUTH_ERROR");
        assert_eq!(body["error"], "Missing access token");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_before_upgrade() {
        let app = websocket_router().with_state(state(MockSessionValidator::new()));

        let response = app
            .oneshot(Request::builder().uri("/ws?token=nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid token");
    }

    #[tokio::test]
    async fn auth_outage_is_service_unavailable() {
        let sessions = MockSessionValidator::new().with_error(AuthError::service_unavailable("down"));
        let app = websocket_router().with_state(state(sessions));

        let response = app
            .oneshot(Request::builder().uri("/ws?token=any").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn authenticated_plain_request_needs_upgrade() {
        let sessions = MockSessionValidator::new().with_test_user("good", "alice");
        let app = websocket_router().with_state(state(sessions));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ws")
                    .header(header::AUTHORIZATION, "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    }
}
