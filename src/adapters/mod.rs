//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Access token validation (JWT, mock)
//! - `bus` - Message bus implementations (Redis, in-memory, disabled)
//! - `http` - Health and routing
//! - `participants` - Conversation membership checks (PostgreSQL, in-memory)
//! - `websocket` - Rooms, relay and the client protocol

pub mod auth;
pub mod bus;
pub mod http;
pub mod participants;
pub mod websocket;
