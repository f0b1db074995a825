use thiserror::Error;

use crate::utils::truncate_string;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Credential rejected by server")]
    TokenRejected,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Build a `Remote` error from a non-JSON body, truncating it so large
    /// HTML error pages don't end up in logs.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            Self::default_message(status.as_u16()).to_string()
        } else {
            truncate_string(body.trim(), MAX_ERROR_BODY_LENGTH)
        };
        ApiError::Remote {
            status: status.as_u16(),
            message,
        }
    }

    /// Fallback wording when the server did not send a message.
    pub fn default_message(status: u16) -> &'static str {
        match status {
            400 => "Invalid input",
            401 => "Unauthorized",
            403 => "Access forbidden",
            404 => "Not found",
            429 => "Too many requests",
            500..=599 => "Server error",
            _ => "Request failed",
        }
    }

    /// HTTP status of the failed request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message suitable for showing inline next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::Network(_) => "Network error. Please check your connection.".to_string(),
            ApiError::Remote { status, message } => match status {
                400 => "Invalid input. Please check your details.".to_string(),
                401 => "Unauthorized. Incorrect email or password.".to_string(),
                403 => "Access forbidden. Please contact support.".to_string(),
                500 => "Server error. Please try again later.".to_string(),
                _ => message.clone(),
            },
            ApiError::TokenRejected => "Your session has expired. Please log in again.".to_string(),
            ApiError::InvalidResponse(_) => "Invalid server response".to_string(),
        }
    }
}
