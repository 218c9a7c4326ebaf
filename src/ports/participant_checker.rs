//! Participant check port - "is this user allowed into this room?"
//!
//! The CRUD layer owns conversation membership. The real-time layer asks this
//! port before accepting a `join_conversation`; the room registry itself never
//! authorizes anything.
//!
//! # Design
//!
//! Callers treat errors as a denial (fail-secure): a join is only accepted on
//! an explicit `Ok(true)`.

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, DomainError, UserId};

/// Port for checking conversation participation.
#[async_trait]
pub trait ParticipantChecker: Send + Sync {
    /// Returns whether `user_id` is a participant of `conversation_id`.
    async fn is_participant(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<bool, DomainError>;
}
