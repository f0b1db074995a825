//! REST API client module for the Omeife developer API.
//!
//! This module provides the `ApiClient` for account calls (login, register,
//! token refresh, API key issuance) and the API-key authenticated developer
//! endpoints. Responses share a `{status, message, data, auth}` envelope
//! which `envelope` turns into data or an `ApiError`.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{ApiClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use envelope::AUTH_REJECTED_SENTINEL;
pub use error::ApiError;
