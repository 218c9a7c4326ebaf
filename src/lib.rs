//! Social Realtime - conversation fan-out for a social messaging backend.
//!
//! Relays new messages and typing indicators from a Redis pub/sub bus to
//! WebSocket clients grouped into per-conversation rooms, so every server
//! process delivers every event to its own connections.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
