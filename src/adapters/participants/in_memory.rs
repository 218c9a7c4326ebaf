//! In-memory ParticipantChecker for tests and local development.
//!
//! # Usage
//!
//! ```ignore
//! let checker = InMemoryParticipantChecker::new()
//!     .with_participant("c1", "alice")
//!     .with_participant("c1", "bob");
//!
//! // Or let everyone in:
//! let checker = InMemoryParticipantChecker::allow_all();
//! ```

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, UserId};
use crate::ports::ParticipantChecker;

#[derive(Debug, Default)]
pub struct InMemoryParticipantChecker {
    participants: RwLock<HashSet<(String, String)>>,
    allow_all: bool,
    /// Simulates the database being unreachable.
    failing: RwLock<bool>,
}

impl InMemoryParticipantChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker that admits every user to every conversation.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    pub fn with_participant(self, conversation_id: &str, user_id: &str) -> Self {
        self.add_participant(conversation_id, user_id);
        self
    }

    pub fn add_participant(&self, conversation_id: &str, user_id: &str) {
        self.write()
            .insert((conversation_id.to_string(), user_id.to_string()));
    }

    pub fn remove_participant(&self, conversation_id: &str, user_id: &str) {
        self.write()
            .remove(&(conversation_id.to_string(), user_id.to_string()));
    }

    /// Makes every check fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(|p| p.into_inner()) = failing;
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<(String, String)>> {
        self.participants.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<(String, String)>> {
        self.participants.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ParticipantChecker for InMemoryParticipantChecker {
    async fn is_participant(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<bool, DomainError> {
        if *self.failing.read().unwrap_or_else(|p| p.into_inner()) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "participant store unavailable",
            ));
        }
        if self.allow_all {
            return Ok(true);
        }
        Ok(self.read().contains(&(
            conversation_id.as_str().to_string(),
            user_id.as_str().to_string(),
        )))
    }
}
