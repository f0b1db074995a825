//! Error types for the session layer.

use thiserror::Error;

use crate::api::ApiError;

use super::store::StoreError;

/// Errors surfaced by session and developer-service operations.
///
/// None of these are fatal: a front end shows [`SessionError::user_message`]
/// next to the action that failed and lets the user retry.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A success payload was missing something it must carry.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The operation needs a bearer token and there is none.
    #[error("Authentication token is missing")]
    MissingToken,

    /// The operation needs a developer API key and none is available.
    #[error("No API key available")]
    MissingApiKey,

    /// The refresh endpoint rejected the token or answered nonsense. The
    /// session has been logged out by the time this is returned.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The server kept rejecting the credential after the allowed number
    /// of refresh-and-retry rounds.
    #[error("Credential still rejected after refreshing")]
    AuthPersistentlyRejected,

    /// Local validation failed before anything was sent.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Message suitable for showing inline next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::InvalidResponse(_) => "Invalid server response".to_string(),
            SessionError::MissingToken => {
                "Authentication token is missing. Please log in again.".to_string()
            }
            SessionError::MissingApiKey => {
                "No API key available. Please generate or enter one.".to_string()
            }
            SessionError::RefreshFailed(_) => {
                "Your session has expired. Please log in again.".to_string()
            }
            SessionError::AuthPersistentlyRejected => {
                "The server keeps rejecting your credentials. Please log in again.".to_string()
            }
            SessionError::InvalidInput(message) => message.clone(),
            SessionError::Api(e) => e.user_message(),
            SessionError::Store(_) => "Could not access local credential storage.".to_string(),
        }
    }

    /// Whether the user has to sign in again before retrying makes sense.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionError::MissingToken
                | SessionError::RefreshFailed(_)
                | SessionError::AuthPersistentlyRejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            SessionError::MissingApiKey.user_message(),
            "No API key available. Please generate or enter one."
        );
        assert_eq!(
            SessionError::InvalidInput("Please enter text to translate".to_string())
                .user_message(),
            "Please enter text to translate"
        );
        let remote = SessionError::from(ApiError::Remote {
            status: 403,
            message: "nope".to_string(),
        });
        assert_eq!(remote.user_message(), "Access forbidden. Please contact support.");
    }

    #[test]
    fn test_requires_login() {
        assert!(SessionError::MissingToken.requires_login());
        assert!(SessionError::RefreshFailed("401".to_string()).requires_login());
        assert!(SessionError::AuthPersistentlyRejected.requires_login());
        assert!(!SessionError::MissingApiKey.requires_login());
        assert!(!SessionError::InvalidInput("x".to_string()).requires_login());
    }
}
