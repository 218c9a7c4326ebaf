//! WebSocket adapters for real-time conversation fan-out.
//!
//! Pushes new messages and typing indicators to every connection that joined
//! a conversation room, across every server process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Message Bus                                 │
//! │   conversation:{id}   typing:{id}   (Redis pub/sub in production)   │
//! └─────────────────────────────────────────────────────────────────────┘
//!          ▲ publish                                  │ psubscribe
//!          │                                          ▼
//! ┌──────────────────┐                     ┌──────────────────────────┐
//! │   RealtimeHub    │                     │        BusRelay          │
//! │  - join / leave  │                     │  - bounded reconnect     │
//! │  - send_message  │                     │  - routes by channel     │
//! │  - typing        │                     └──────────────────────────┘
//! └──────────────────┘                                  │ broadcasts
//!          │ local fallback                             ▼
//!          └──────────────────────────────▶┌──────────────────────────┐
//!                                          │       RoomRegistry       │
//!                                          │  Room: c1    Room: c2    │
//!                                          │  ├── conn-a  └── conn-c  │
//!                                          │  └── conn-b              │
//!                                          └──────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`rooms`] - Room membership for this process's connections
//! - [`relay`] - Bus subscription feeding the rooms
//! - [`hub`] - Protocol handling and delivery policy
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod hub;
pub mod messages;
pub mod relay;
pub mod rooms;

pub use handler::{websocket_router, ws_handler, WebSocketState, WsConnectParams};
pub use hub::{Delivery, RealtimeError, RealtimeHub};
pub use messages::{
    ClientMessage, ConnectedMessage, ErrorMessage, PongMessage, RoomAck, RoomRequest,
    SendMessageRequest, ServerMessage, TypingRequest,
};
pub use relay::{BusRelay, RelayState};
pub use rooms::RoomRegistry;
