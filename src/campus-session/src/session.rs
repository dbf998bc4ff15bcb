//! Process-wide session state.
//!
//! [`SessionStore`] is the only writer of the stored token. It drives the
//! status machine
//!
//! ```text
//! Anonymous --login/register/hydrate--> Authenticating --ok--> Authenticated
//! Authenticating --failure--> Anonymous
//! Authenticated --rejected token--> Invalidated --storage cleared--> Anonymous
//! Authenticated --logout--> Anonymous
//! Authenticated --login/register--> Authenticating (previous session logged out)
//! ```
//!
//! The shared state lives in [`SessionInner`], which the [`ApiClient`] also
//! holds so it can read the token at dispatch time and ask for invalidation.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus::{AuthInvalidationBus, InvalidationReason, StatusListeners, Subscription};
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::constants::{LEGACY_USER_KEY, TOKEN_KEY, endpoints};
use crate::error::{Result, SessionError};
use crate::storage::StorageAdapter;
use crate::types::{
    LoginRequest, PasswordChange, PasswordResetRequest, ProfileUpdate, RegisterRequest, Session,
    SessionStatus, TokenResponse, UserProfile,
};
use crate::utils::mask_token;

const CLOSED_WHILE_SIGNING_IN: &str = "Session was closed while signing in";

/// State shared between the store and its HTTP client.
pub(crate) struct SessionInner {
    state: Mutex<Session>,
    storage: StorageAdapter,
    invalidation_bus: AuthInvalidationBus,
    status_listeners: StatusListeners,
    /// Serializes every write to the token slot.
    writer: tokio::sync::Mutex<()>,
}

impl SessionInner {
    fn new(storage: StorageAdapter) -> Self {
        Self {
            state: Mutex::new(Session::default()),
            storage,
            invalidation_bus: AuthInvalidationBus::new(),
            status_listeners: StatusListeners::new(),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Token to attach to outgoing requests. Only a committed session has one.
    pub(crate) fn current_token(&self) -> Option<String> {
        let state = self.state.lock();
        match (&state.status, &state.token) {
            (SessionStatus::Authenticated, Some(token)) => Some(token.expose_secret().to_string()),
            _ => None,
        }
    }

    fn notify(&self, status: SessionStatus) {
        debug!(%status, "Session status changed");
        self.status_listeners.publish(&status);
    }

    /// Enter `Authenticating`. Returns the epoch the attempt belongs to and
    /// whether a committed session was closed to make room for it.
    fn begin_authenticating(&self) -> Result<(u64, bool)> {
        let (epoch, replaced) = {
            let mut state = self.state.lock();
            if state.status == SessionStatus::Authenticating {
                return Err(SessionError::LoginInProgress);
            }
            let replaced = state.status == SessionStatus::Authenticated;
            if replaced {
                state.epoch += 1;
            }
            state.status = SessionStatus::Authenticating;
            state.token = None;
            state.user = None;
            (state.epoch, replaced)
        };
        self.notify(SessionStatus::Authenticating);
        Ok((epoch, replaced))
    }

    /// Finish closing a session replaced by a new sign-in: drop its stored
    /// token and tell subscribers, as `logout` would.
    async fn close_replaced_session(&self, epoch: u64) {
        let writer = self.writer.lock().await;
        if self.epoch() == epoch {
            self.storage.remove(TOKEN_KEY).await;
        }
        drop(writer);

        info!("Previous session closed for a new sign-in");
        self.invalidation_bus.publish(&InvalidationReason::LoggedOut);
    }

    /// Persist a token that has not resolved a profile yet.
    async fn store_pending_token(&self, epoch: u64, token: &str) -> Result<()> {
        let _writer = self.writer.lock().await;
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return Err(SessionError::AuthenticationExpired {
                    message: CLOSED_WHILE_SIGNING_IN.to_string(),
                });
            }
            state.token = Some(SecretString::from(token.to_string()));
        }
        self.storage.set(TOKEN_KEY, token).await;
        Ok(())
    }

    /// Move a pending sign-in to `Authenticated`.
    fn commit(&self, epoch: u64, token: String, user: UserProfile) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.epoch != epoch || state.status != SessionStatus::Authenticating {
                return Err(SessionError::AuthenticationExpired {
                    message: CLOSED_WHILE_SIGNING_IN.to_string(),
                });
            }
            state.status = SessionStatus::Authenticated;
            state.token = Some(SecretString::from(token));
            state.user = Some(user);
        }
        self.notify(SessionStatus::Authenticated);
        Ok(())
    }

    /// Roll a failed sign-in back to `Anonymous`.
    ///
    /// If the epoch moved, a logout or invalidation already cleared storage
    /// and owns the status, so there is nothing to undo.
    async fn abort_authenticating(&self, epoch: u64) {
        let _writer = self.writer.lock().await;
        if self.epoch() != epoch {
            return;
        }
        self.storage.remove(TOKEN_KEY).await;

        let reverted = {
            let mut state = self.state.lock();
            let current = state.epoch == epoch && state.status == SessionStatus::Authenticating;
            if current {
                state.status = SessionStatus::Anonymous;
                state.token = None;
                state.user = None;
            }
            current
        };
        if reverted {
            self.notify(SessionStatus::Anonymous);
        }
    }

    /// Invalidate because `attached` was rejected. Stale tokens are ignored.
    pub(crate) async fn invalidate_token(&self, attached: &str) -> bool {
        self.invalidate_if(Some(attached)).await
    }

    /// Clear the session and publish once. Idempotent.
    async fn invalidate_if(&self, attached: Option<&str>) -> bool {
        let writer = self.writer.lock().await;
        let epoch = {
            let mut state = self.state.lock();
            if state.status.is_signed_out() {
                return false;
            }
            if let Some(attached) = attached {
                let matches = state.status == SessionStatus::Authenticated
                    && state
                        .token
                        .as_ref()
                        .is_some_and(|token| token.expose_secret().trim() == attached);
                if !matches {
                    debug!(token = %mask_token(attached), "Ignoring rejection of a stale token");
                    return false;
                }
            }
            state.status = SessionStatus::Invalidated;
            state.epoch += 1;
            state.token = None;
            state.user = None;
            state.epoch
        };
        self.notify(SessionStatus::Invalidated);

        self.storage.remove(TOKEN_KEY).await;

        let settled = {
            let mut state = self.state.lock();
            // A sign-in may have started once the status left Authenticated.
            let current = state.epoch == epoch && state.status == SessionStatus::Invalidated;
            if current {
                state.status = SessionStatus::Anonymous;
            }
            current
        };
        if settled {
            self.notify(SessionStatus::Anonymous);
        }
        drop(writer);

        info!("Session invalidated");
        self.invalidation_bus
            .publish(&InvalidationReason::SessionExpired);
        true
    }

    /// Replace the cached profile if the session is still the same one.
    fn replace_user(&self, epoch: u64, user: UserProfile) {
        let mut state = self.state.lock();
        if state.epoch == epoch && state.status == SessionStatus::Authenticated {
            state.user = Some(user);
        }
    }
}

/// Owner of the process-wide session.
///
/// Construct once at startup and share it; clones refer to the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
    api: ApiClient,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.status())
            .field("storage", &self.inner.storage)
            .field("api", &self.api)
            .finish()
    }
}

impl SessionStore {
    /// Build the store and its HTTP client. The session starts `Anonymous`;
    /// call [`hydrate`](Self::hydrate) to restore a stored token.
    pub fn new(config: &ClientConfig, storage: StorageAdapter) -> Result<Self> {
        let http = campus_common::create_client_with_timeout(config.request_timeout())
            .map_err(SessionError::config)?;
        let inner = Arc::new(SessionInner::new(storage));
        let api = ApiClient::new(
            http,
            &config.api.base_url,
            config.profile_timeout(),
            Arc::clone(&inner),
        );
        Ok(Self { inner, api })
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.status()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// The committed bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.inner.current_token()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.inner.storage
    }

    pub fn invalidation_bus(&self) -> &AuthInvalidationBus {
        &self.inner.invalidation_bus
    }

    /// Register a listener for every status transition.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.inner.status_listeners.subscribe(listener)
    }

    /// Restore a stored token at startup. Never fails; any problem leaves the
    /// session `Anonymous` with storage cleared.
    pub async fn hydrate(&self) -> SessionStatus {
        // Older builds persisted the profile; it is never read back.
        self.inner.storage.remove(LEGACY_USER_KEY).await;

        if self.status() != SessionStatus::Anonymous {
            return self.status();
        }

        let Some(token) = self
            .inner
            .storage
            .get(TOKEN_KEY)
            .await
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
        else {
            debug!("No stored session");
            return self.status();
        };

        let Ok((epoch, _)) = self.inner.begin_authenticating() else {
            return self.status();
        };

        let restored = match self.api.fetch_profile_with(&token).await {
            Ok(profile) => self.inner.commit(epoch, token, profile),
            Err(e) => Err(e),
        };
        match restored {
            Ok(()) => info!(backend = self.inner.storage.backend_name(), "Session restored"),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Stored session could not be restored");
                self.inner.abort_authenticating(epoch).await;
            }
        }
        self.status()
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let body = LoginRequest { email, password };
        self.sign_in(endpoints::LOGIN, &body, "Failed to sign in")
            .await
    }

    /// Create an account and sign in with it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        student_id: &str,
    ) -> Result<UserProfile> {
        let body = RegisterRequest {
            email,
            password,
            full_name,
            student_id,
        };
        self.sign_in(endpoints::REGISTER, &body, "Failed to register")
            .await
    }

    async fn sign_in<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<UserProfile> {
        let (epoch, replaced) = self.inner.begin_authenticating()?;
        if replaced {
            self.inner.close_replaced_session(epoch).await;
        }

        match self.complete_sign_in(epoch, path, body, fallback).await {
            Ok(profile) => {
                info!(student_id = %profile.student_id, "Signed in");
                Ok(profile)
            }
            Err(e) => {
                debug!(kind = %e.kind(), error = %e, "Sign-in failed");
                self.inner.abort_authenticating(epoch).await;
                Err(e)
            }
        }
    }

    async fn complete_sign_in<B: Serialize>(
        &self,
        epoch: u64,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<UserProfile> {
        let response: TokenResponse = self
            .api
            .request(Method::POST, path)
            .json(body)?
            .anonymous()
            .fallback(fallback)
            .send()
            .await?;

        let token = response.access_token.trim().to_string();
        if token.is_empty() {
            return Err(SessionError::invalid_response("No token received from server"));
        }

        self.inner.store_pending_token(epoch, &token).await?;
        let profile = self.api.fetch_profile_with(&token).await?;
        self.inner.commit(epoch, token, profile.clone())?;
        Ok(profile)
    }

    /// Sign out. Publishes on the invalidation bus before returning, unless
    /// there was no session to close.
    pub async fn logout(&self) {
        let writer = self.inner.writer.lock().await;
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = state.status;
            state.status = SessionStatus::Anonymous;
            state.epoch += 1;
            state.token = None;
            state.user = None;
            previous
        };
        self.inner.storage.remove(TOKEN_KEY).await;
        drop(writer);

        if previous == SessionStatus::Anonymous {
            debug!("Logout without a session");
            return;
        }

        info!("Signed out");
        self.inner.notify(SessionStatus::Anonymous);
        self.inner
            .invalidation_bus
            .publish(&InvalidationReason::LoggedOut);
    }

    /// Clear the session as if the backend had rejected its token.
    ///
    /// Normally triggered by [`ApiClient`]; a no-op when already signed out.
    pub async fn invalidate(&self) -> bool {
        self.inner.invalidate_if(None).await
    }

    fn require_session(&self) -> Result<u64> {
        let state = self.inner.state.lock();
        if state.status == SessionStatus::Authenticated {
            Ok(state.epoch)
        } else {
            Err(SessionError::NotAuthenticated)
        }
    }

    /// Re-fetch the profile of the signed-in user.
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let epoch = self.require_session()?;
        let profile: UserProfile = self
            .api
            .request(Method::GET, endpoints::PROFILE)
            .fallback("Failed to load profile")
            .send()
            .await?;
        self.inner.replace_user(epoch, profile.clone());
        Ok(profile)
    }

    /// Update profile fields.
    pub async fn update_profile(&self, changes: &ProfileUpdate) -> Result<UserProfile> {
        let epoch = self.require_session()?;
        let profile: UserProfile = self
            .api
            .request(Method::PUT, endpoints::PROFILE)
            .json(changes)?
            .fallback("Failed to update profile")
            .send()
            .await?;
        self.inner.replace_user(epoch, profile.clone());
        Ok(profile)
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        self.require_session()?;
        let body = PasswordChange {
            current_password,
            new_password,
        };
        self.api
            .request(Method::POST, endpoints::CHANGE_PASSWORD)
            .json(&body)?
            .fallback("Failed to change password")
            .send_empty()
            .await
    }

    /// Ask for a password reset email. The backend answers the same way
    /// whether or not the address exists.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.api
            .request(Method::POST, endpoints::PASSWORD_RESET)
            .json(&PasswordResetRequest { email })?
            .anonymous()
            .send_empty()
            .await
            .map_err(|e| e.with_message("Failed to request password reset"))
    }
}
