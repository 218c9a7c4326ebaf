//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, auth identity and error types
//! shared by the messaging domain and the adapters.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, ConversationId, MessageId, UserId};
pub use timestamp::Timestamp;
