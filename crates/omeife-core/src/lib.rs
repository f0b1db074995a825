//! Core library for omeife: API client, models, session and credential
//! handling, and the API-key authenticated developer services.
//!
//! The front end (the `omeife` CLI) builds a [`SessionManager`] from a
//! [`Config`], wraps it in [`DeveloperServices`] for feature calls and
//! watches [`SessionManager::subscribe`] / [`SessionManager::events`] for
//! session changes.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    CredentialStore, LoginOutcome, Route, SessionConfig, SessionError, SessionEvent,
    SessionManager, SessionSnapshot, SessionState, TokenStore,
};
pub use config::{Config, StorageBackend};
pub use models::{AudioUpload, Language, Registration, User};
pub use services::{DeveloperServices, KeySource};
