//! The `{status, message, data, auth}` wrapper every endpoint responds with.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ApiError;

/// Value of `auth` when the presented credential was rejected.
pub const AUTH_REJECTED_SENTINEL: &str = "auth-001";

const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: Option<String>,
    pub message: Option<String>,
    pub data: Option<T>,
    pub auth: Option<String>,
}

impl<T> Envelope<T> {
    pub fn is_auth_rejected(&self) -> bool {
        self.auth.as_deref() == Some(AUTH_REJECTED_SENTINEL)
    }

    /// A missing `status` counts as success; some endpoints only send `data`.
    pub fn is_success(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == STATUS_SUCCESS)
    }

    /// `status` is present and says success.
    pub fn is_explicit_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESS)
    }
}

/// Classify a response body into data or an `ApiError`.
pub fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    decode_envelope(status, body)?
        .data
        .ok_or_else(|| ApiError::InvalidResponse("Response has no data".to_string()))
}

/// Like [`decode`], for endpoints whose `data` is optional. Returns the
/// whole envelope once it is known to be a success.
pub fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<Envelope<T>, ApiError> {
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            // The sentinel can still be present when `data` has an
            // unexpected shape.
            if is_auth_rejected_body(body) {
                return Err(ApiError::TokenRejected);
            }
            if !status.is_success() {
                return Err(ApiError::from_status(status, body));
            }
            return Err(ApiError::InvalidResponse(format!(
                "Failed to parse response: {}",
                e
            )));
        }
    };

    if envelope.is_auth_rejected() {
        return Err(ApiError::TokenRejected);
    }

    if !status.is_success() || !envelope.is_success() {
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| ApiError::default_message(status.as_u16()).to_string());
        return Err(ApiError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    Ok(envelope)
}

fn is_auth_rejected_body(body: &str) -> bool {
    #[derive(Deserialize)]
    struct AuthOnly {
        auth: Option<String>,
    }
    serde_json::from_str::<AuthOnly>(body)
        .map(|a| a.auth.as_deref() == Some(AUTH_REJECTED_SENTINEL))
        .unwrap_or(false)
}
