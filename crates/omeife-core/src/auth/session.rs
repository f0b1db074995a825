//! The session manager: owns the signed-in session and its credentials.
//!
//! ```text
//!             login()                     refresh_token()
//! [Anonymous] ───────→ [Authenticated] ─────────────────→ [Refreshing]
//!      ▲                  │       ▲                            │
//!      │     logout()     │       └──────── success ───────────┤
//!      └──────────────────┘                                    │
//!      ▲                                                       │
//!      └────────────────── failure (forced logout) ────────────┘
//! ```
//!
//! Every credential change is persisted to the [`TokenStore`] before the
//! in-memory copy is swapped, so memory never holds a token storage
//! doesn't.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{LoginData, Registration, User};

use super::error::SessionError;
use super::store::TokenStore;
use super::token::{is_token_expired, TokenClaims};

/// How often the background sweep looks at the token (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Refresh-and-retry rounds allowed when the server rejects a credential
pub const DEFAULT_MAX_AUTH_RETRIES: u32 = 1;

/// Buffered session events per subscriber before old ones are dropped
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sweep_interval: Duration,
    pub max_auth_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_auth_retries: DEFAULT_MAX_AUTH_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Refreshing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        }
    }
}

/// Where a front end should go after a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Landing,
    Login,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn(Option<User>),
    LoggedOut,
    TokenRefreshed,
    ApiKeyIssued,
    Navigate(Route),
}

/// What observers see. Credentials themselves are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<User>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub has_api_key: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Anonymous,
            user: None,
            token_expires_at: None,
            has_api_key: false,
        }
    }
}

/// Result of a successful login. Key provisioning is best effort: when it
/// fails the login still stands and the failure is reported as `warning`.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: Option<User>,
    pub api_key: Option<String>,
    pub warning: Option<SessionError>,
}

#[derive(Default)]
struct Session {
    token: Option<String>,
    user: Option<User>,
    api_key: Option<String>,
}

type RefreshOutcome = Result<String, String>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct Inner {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    config: SessionConfig,
    session: RwLock<Session>,
    refresh_in_flight: Mutex<Option<SharedRefresh>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let sweep = self.sweep.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = sweep.take() {
            handle.abort();
        }
    }
}

/// Handle to the application's session. Clone is cheap and every clone
/// sees the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager, restoring a persisted session if its token is
    /// still valid. An expired persisted token is purged together with
    /// its API key.
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>, config: SessionConfig) -> Self {
        let session = Self::restore(store.as_ref());
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let manager = Self {
            inner: Arc::new(Inner {
                api,
                store,
                config,
                session: RwLock::new(session),
                refresh_in_flight: Mutex::new(None),
                snapshot_tx,
                events_tx,
                sweep: Mutex::new(None),
            }),
        };
        manager.publish();
        manager
    }

    fn restore(store: &dyn TokenStore) -> Session {
        let token = store.load_token().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored token");
            None
        });

        match token {
            Some(token) if is_token_expired(&token) => {
                info!("Discarding expired stored session");
                if let Err(e) = store.clear_token() {
                    warn!(error = %e, "Failed to clear stored token");
                }
                if let Err(e) = store.clear_api_key() {
                    warn!(error = %e, "Failed to clear stored API key");
                }
                Session::default()
            }
            Some(token) => {
                let api_key = store.load_api_key().unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to read stored API key");
                    None
                });
                debug!(has_api_key = api_key.is_some(), "Restored stored session");
                Session {
                    token: Some(token),
                    user: None,
                    api_key,
                }
            }
            None => Session::default(),
        }
    }

    // =========================================================================
    // State access
    // =========================================================================

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.session.write().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<SharedRefresh>> {
        self.inner
            .refresh_in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn api_key(&self) -> Option<String> {
        self.read().api_key.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn state(&self) -> SessionState {
        if self.refresh_slot().is_some() {
            SessionState::Refreshing
        } else if self.read().token.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// Token present and not expired. Recomputed on every call.
    pub fn is_authenticated(&self) -> bool {
        self.read()
            .token
            .as_deref()
            .map(|token| !is_token_expired(token))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let session = self.read();
        SessionSnapshot {
            state,
            user: session.user.clone(),
            token_expires_at: session
                .token
                .as_deref()
                .and_then(|t| TokenClaims::decode(t).ok())
                .map(|claims| claims.expires_at()),
            has_api_key: session.api_key.is_some(),
        }
    }

    /// Receive a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Receive session events, including navigation requests.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events_tx.subscribe()
    }

    fn publish(&self) {
        self.inner.snapshot_tx.send_replace(self.snapshot());
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events_tx.send(event);
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Start a session from a login payload, then provision an API key.
    pub async fn login(&self, response: LoginData) -> Result<LoginOutcome, SessionError> {
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::InvalidResponse("Invalid login response".to_string()))?;

        // A key belongs to the session that issued it
        self.inner.store.clear_api_key()?;
        self.inner.store.save_token(&token)?;
        let user = response.user;
        {
            let mut session = self.write();
            session.token = Some(token);
            session.user = user.clone();
            session.api_key = None;
        }
        self.publish();
        self.emit(SessionEvent::LoggedIn(user.clone()));
        info!(
            user = %user.as_ref().map(|u| u.display_name()).unwrap_or_default(),
            "Logged in"
        );

        let (api_key, warning) = match self.generate_api_key().await {
            Ok(key) => (Some(key), None),
            Err(e) => {
                warn!(error = %e, "Initial API key generation failed");
                (None, Some(e))
            }
        };

        self.emit(SessionEvent::Navigate(Route::Dashboard));
        Ok(LoginOutcome {
            user,
            api_key,
            warning,
        })
    }

    /// Authenticate with email and password and start a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let response = match self.inner.api.login(email, password).await {
            Ok(response) => response,
            Err(ApiError::InvalidResponse(reason)) => {
                debug!(%reason, "Unreadable login response");
                return Err(SessionError::InvalidResponse(
                    "Invalid login response".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        self.login(response).await
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> Result<Option<String>, SessionError> {
        registration.validate().map_err(SessionError::InvalidInput)?;
        let message = self.inner.api.register(registration).await?;
        info!("Account registered");
        self.emit(SessionEvent::Navigate(Route::Login));
        Ok(message)
    }

    /// End the session in memory and in storage. Never fails; storage
    /// errors are logged.
    pub fn logout(&self) {
        if let Err(e) = self.inner.store.clear_token() {
            warn!(error = %e, "Failed to clear stored token");
        }
        if let Err(e) = self.inner.store.clear_api_key() {
            warn!(error = %e, "Failed to clear stored API key");
        }
        *self.write() = Session::default();

        self.publish();
        self.emit(SessionEvent::LoggedOut);
        self.emit(SessionEvent::Navigate(Route::Landing));
        info!("Logged out");
    }

    // =========================================================================
    // Token refresh
    // =========================================================================

    /// Exchange the current token for a new one.
    ///
    /// Only one refresh request is in flight at a time; callers arriving
    /// while one is running wait for it and get the same outcome. The
    /// refresh runs as its own task, so it completes even if every caller
    /// stops waiting. On failure the session is logged out.
    pub async fn refresh_token(&self) -> Result<String, SessionError> {
        let (refresh, started) = {
            let mut slot = self.refresh_slot();
            match slot.clone() {
                Some(in_flight) => {
                    debug!("Joining in-flight token refresh");
                    (in_flight, false)
                }
                None => {
                    let token = self.token().ok_or(SessionError::MissingToken)?;
                    let task = tokio::spawn(Self::run_refresh(
                        Arc::downgrade(&self.inner),
                        self.inner.api.clone(),
                        token,
                    ));
                    let refresh = async move {
                        task.await
                            .unwrap_or_else(|e| Err(format!("refresh task failed: {}", e)))
                    }
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    (refresh, true)
                }
            }
        };

        if started {
            self.publish();
        }

        refresh.await.map_err(SessionError::RefreshFailed)
    }

    async fn run_refresh(inner: Weak<Inner>, api: ApiClient, token: String) -> RefreshOutcome {
        debug!("Refreshing token");
        let result = api.refresh(&token).await;

        let Some(inner) = inner.upgrade() else {
            return Err("session was closed during refresh".to_string());
        };
        let manager = SessionManager { inner };

        let outcome = match result {
            Ok(new_token) => manager.swap_token(&token, new_token),
            Err(e) => Err(e.to_string()),
        };

        *manager.refresh_slot() = None;

        match outcome {
            Ok(new_token) => {
                manager.publish();
                manager.emit(SessionEvent::TokenRefreshed);
                info!("Token refreshed");
                Ok(new_token)
            }
            Err(reason) => {
                if manager.token().is_some() {
                    error!(%reason, "Token refresh failed, logging out");
                    manager.logout();
                } else {
                    manager.publish();
                }
                Err(reason)
            }
        }
    }

    /// Persist and install a refreshed token, unless the session it was
    /// refreshed for has ended or been replaced in the meantime.
    fn swap_token(&self, old: &str, new_token: String) -> RefreshOutcome {
        let current = self.read().token.clone();
        match current {
            None => Err("session ended during refresh".to_string()),
            Some(current) if current != old => {
                debug!("Session changed during refresh, discarding refreshed token");
                Ok(current)
            }
            Some(_) => {
                self.inner
                    .store
                    .save_token(&new_token)
                    .map_err(|e| format!("failed to persist refreshed token: {}", e))?;
                self.write().token = Some(new_token.clone());
                Ok(new_token)
            }
        }
    }

    // =========================================================================
    // API key
    // =========================================================================

    /// Issue a developer API key with the current token, refreshing the
    /// token if the server rejects it.
    pub async fn generate_api_key(&self) -> Result<String, SessionError> {
        let mut retries = 0;
        loop {
            let token = self.token().ok_or(SessionError::MissingToken)?;

            match self.inner.api.generate_key(&token).await {
                Ok(key) => {
                    self.inner.store.save_api_key(&key)?;
                    self.write().api_key = Some(key.clone());
                    self.publish();
                    self.emit(SessionEvent::ApiKeyIssued);
                    info!("API key issued");
                    return Ok(key);
                }
                Err(ApiError::TokenRejected) => {
                    if retries >= self.inner.config.max_auth_retries {
                        warn!(retries, "Token still rejected after refresh");
                        return Err(SessionError::AuthPersistentlyRejected);
                    }
                    retries += 1;
                    info!(retry = retries, "Token rejected during key generation, refreshing");
                    self.refresh_token().await?;
                }
                Err(e) => {
                    warn!(error = %e, "API key generation failed");
                    return Err(e.into());
                }
            }
        }
    }

    // =========================================================================
    // Expiration sweep
    // =========================================================================

    /// Refresh the token if it has expired; log out if that fails.
    /// Returns true when a refresh was attempted.
    pub async fn check_expiration(&self) -> bool {
        let expired = match self.token() {
            Some(token) => is_token_expired(&token),
            None => return false,
        };
        if !expired {
            return false;
        }

        debug!("Token expired, refreshing");
        if let Err(e) = self.refresh_token().await {
            warn!(error = %e, "Background refresh failed");
            if self.token().is_some() {
                self.logout();
            }
        }
        true
    }

    /// Start checking expiry every `sweep_interval`. Must be called from
    /// within a tokio runtime. Starting twice keeps the running task.
    pub fn start_expiration_sweep(&self) {
        let mut sweep = self.inner.sweep.lock().unwrap_or_else(|e| e.into_inner());
        if sweep.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return;
        }

        let period = self.inner.config.sweep_interval;
        let weak = Arc::downgrade(&self.inner);
        *sweep = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // The task must not keep the session alive on its own
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SessionManager { inner }.check_expiration().await;
            }
        }));
        debug!(period_secs = period.as_secs_f64(), "Expiration sweep started");
    }

    pub fn stop_expiration_sweep(&self) {
        let handle = self
            .inner
            .sweep
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Expiration sweep stopped");
        }
    }

    pub fn is_sweep_running(&self) -> bool {
        self.inner
            .sweep
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Tear down background work. The session itself is left as is.
    pub fn shutdown(&self) {
        self.stop_expiration_sweep();
    }
}
