//! Authentication types for the domain layer.
//!
//! `AuthenticatedUser` is what the WebSocket handshake knows about the caller
//! once a token has been validated through the `SessionValidator` port. It has
//! no provider dependencies.

use super::UserId;
use thiserror::Error;

/// Caller identity extracted from a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The application user id (the token subject).
    pub id: UserId,

    /// Display name if the token carries one.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    /// Returns the display name, or the user id as fallback.
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("No authentication token provided")]
    MissingToken,

    /// The token is malformed or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authentication service is unavailable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_or_id_prefers_name() {
        let user = AuthenticatedUser::new(UserId::new("u1").unwrap(), Some("Alice".into()));
        assert_eq!(user.display_name_or_id(), "Alice");
    }

    #[test]
    fn display_name_or_id_falls_back_to_id() {
        let user = AuthenticatedUser::new(UserId::new("u1").unwrap(), None);
        assert_eq!(user.display_name_or_id(), "u1");
    }

    #[test]
    fn auth_error_messages() {
        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
        assert_eq!(
            AuthError::service_unavailable("timeout").to_string(),
            "Auth service unavailable: timeout"
        );
    }

    #[test]
    fn only_service_errors_are_transient() {
        assert!(AuthError::service_unavailable("x").is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
        assert!(!AuthError::MissingToken.is_transient());
    }
}
