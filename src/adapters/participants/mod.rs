//! Participant check adapters.
//!
//! - `postgres` - Reads `conversation_participants` (production)
//! - `in_memory` - Configurable checker for tests

mod in_memory;
mod postgres;

pub use in_memory::InMemoryParticipantChecker;
pub use postgres::PostgresParticipantChecker;
