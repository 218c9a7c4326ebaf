//! Session validation port for access tokens.
//!
//! The WebSocket handshake calls this before upgrading. Implementations exist
//! for HS256 JWTs and for tests.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Validate the token signature and expiry
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without "Bearer " prefix) and return the user.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    struct SingleTokenValidator;

    #[async_trait]
    impl SessionValidator for SingleTokenValidator {
        async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            if token == "good" {
                Ok(AuthenticatedUser::new(UserId::new("u1").unwrap(), None))
            } else {
                Err(AuthError::InvalidToken)
            }
        }
    }

    #[tokio::test]
    async fn validator_usable_as_trait_object() {
        let validator: Box<dyn SessionValidator> = Box::new(SingleTokenValidator);
        assert_eq!(validator.validate("good").await.unwrap().id.as_str(), "u1");
        assert_eq!(validator.validate("bad").await, Err(AuthError::InvalidToken));
    }
}
