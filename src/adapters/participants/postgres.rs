//! PostgreSQL implementation of ParticipantChecker.
//!
//! Reads the CRUD layer's `conversation_participants` table; the schema is
//! owned elsewhere and never written here.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{ConversationId, DomainError, UserId};
use crate::ports::ParticipantChecker;

/// Database-backed participant check.
///
/// Ids are compared as text so the check does not care whether the columns
/// are UUIDs or integers.
#[derive(Clone)]
pub struct PostgresParticipantChecker {
    pool: PgPool,
}

impl PostgresParticipantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantChecker for PostgresParticipantChecker {
    async fn is_participant(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM conversation_participants
                WHERE conversation_id::text = $1 AND user_id::text = $2
            )
            "#,
        )
        .bind(conversation_id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check participant: {}", e)))?;

        Ok(exists)
    }
}
