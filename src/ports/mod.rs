//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the real-time layer and the outside world. Adapters implement these ports.
//!
//! - `MessageBus` - Process-wide publish/subscribe medium
//! - `ParticipantChecker` - CRUD-owned "may this user join?" check
//! - `SessionValidator` - Access token validation for the WebSocket handshake

mod message_bus;
mod participant_checker;
mod session_validator;

pub use message_bus::{BusDelivery, BusError, BusStream, MessageBus};
pub use participant_checker::ParticipantChecker;
pub use session_validator::SessionValidator;
