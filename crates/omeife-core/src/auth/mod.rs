//! Authentication module for managing the user session and its credentials.
//!
//! This module provides:
//! - `SessionManager`: login, logout, silent token refresh, API key
//!   provisioning and the background expiration sweep
//! - `TokenStore`: persistence for the bearer token and API key (file,
//!   OS keychain or memory)
//! - `TokenClaims` / `is_token_expired`: unverified payload inspection
//! - `CredentialStore`: remembered login passwords in the OS keychain

pub mod credentials;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::CredentialStore;
pub use error::SessionError;
pub use session::{
    LoginOutcome, Route, SessionConfig, SessionEvent, SessionManager, SessionSnapshot,
    SessionState, DEFAULT_MAX_AUTH_RETRIES, DEFAULT_SWEEP_INTERVAL,
};
pub use store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, StorageKey, StoreError, TokenStore,
};
pub use token::{is_token_expired, is_token_expired_at, TokenClaims, TokenError};
