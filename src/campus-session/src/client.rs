//! Authenticated HTTP client for the campus backend.
//!
//! Every call goes through [`ApiRequest::send`]: the bearer token is read from
//! the session at dispatch time, and the response is classified into a
//! [`SessionError`] before anything else sees it. A 401/403 on a request that
//! carried the session token invalidates the session before the error is
//! returned. There are no retries.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::constants::endpoints;
use crate::error::{Result, SessionError};
use crate::session::SessionInner;
use crate::types::UserProfile;

/// Fallback message when a failed response carries no usable detail.
const DEFAULT_FALLBACK: &str = "Request failed";

/// Message for a rejected session token without a backend detail.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";

/// Where the bearer credential for a request comes from.
#[derive(Debug, Clone)]
enum Auth {
    /// The session's current token, if any. Rejection invalidates the session.
    Session,
    /// A token the caller holds that is not committed to the session yet.
    /// Rejection never invalidates.
    Explicit(String),
    /// No credential.
    Anonymous,
}

/// HTTP client bound to one session.
///
/// Cheap to clone; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Arc<str>,
    profile_timeout: Duration,
    session: Arc<SessionInner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub(crate) fn new(
        http: Client,
        base_url: &str,
        profile_timeout: Duration,
        session: Arc<SessionInner>,
    ) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            profile_timeout,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start building a request for `path` (relative to the base URL).
    pub fn request(&self, method: Method, path: impl Into<String>) -> ApiRequest<'_> {
        ApiRequest {
            client: self,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth: Auth::Session,
            timeout: None,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    /// GET `path` and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path).send().await
    }

    /// POST a JSON body to `path`.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::POST, path).json(body)?.send().await
    }

    /// PUT a JSON body to `path`.
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::PUT, path).json(body)?.send().await
    }

    /// DELETE `path` and decode the JSON response.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path).send().await
    }

    /// DELETE `path`, ignoring any response body (204).
    pub async fn delete_empty(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path).send_empty().await
    }

    /// Resolve the profile for a token that is not committed to the session.
    ///
    /// A rejection here means the credentials are bad, not that a session
    /// expired, so it never invalidates.
    pub(crate) async fn fetch_profile_with(&self, token: &str) -> Result<UserProfile> {
        self.request(Method::GET, endpoints::PROFILE)
            .bearer(token)
            .timeout(self.profile_timeout)
            .fallback("Failed to load profile")
            .send()
            .await
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Request builder returned by [`ApiClient::request`].
#[must_use = "requests do nothing until sent"]
pub struct ApiRequest<'a> {
    client: &'a ApiClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    auth: Auth,
    timeout: Option<Duration>,
    fallback: String,
}

impl<'a> ApiRequest<'a> {
    /// Attach a JSON body.
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            SessionError::invalid_response(format!("Failed to encode request body: {e}"))
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Send without any credential.
    pub fn anonymous(mut self) -> Self {
        self.auth = Auth::Anonymous;
        self
    }

    /// Send with `token` instead of the session token.
    pub fn bearer(mut self, token: &str) -> Self {
        self.auth = Auth::Explicit(token.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Message used when a failure carries no backend detail.
    pub fn fallback(mut self, message: impl Into<String>) -> Self {
        self.fallback = message.into();
        self
    }

    /// Send and decode a JSON response body.
    pub async fn send<T: DeserializeOwned>(self) -> Result<T> {
        let response = self.dispatch().await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            SessionError::invalid_response(format!("Failed to decode response: {e}"))
        })
    }

    /// Send and discard the response body.
    pub async fn send_empty(self) -> Result<()> {
        self.dispatch().await?;
        Ok(())
    }

    async fn dispatch(self) -> Result<Response> {
        let url = self.client.url(&self.path);

        // Read at dispatch, never earlier.
        let attached = match &self.auth {
            Auth::Session => self.client.session.current_token(),
            Auth::Explicit(token) => Some(token.clone()),
            Auth::Anonymous => None,
        }
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

        let mut request = self
            .client
            .http
            .request(self.method.clone(), &url)
            .header(ACCEPT, "application/json");
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        if let Some(token) = &attached {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(method = %self.method, path = %self.path, error = %e, "Request failed");
            SessionError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            if self.method != Method::GET {
                debug!(method = %self.method, path = %self.path, status = status.as_u16(), "Request succeeded");
            }
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|e| {
            debug!(method = %self.method, path = %self.path, error = %e, "Failed to read error body");
            String::new()
        });
        let detail = extract_detail(&body);
        Err(self.classify(status, detail, attached).await)
    }

    async fn classify(
        self,
        status: StatusCode,
        detail: Option<String>,
        attached: Option<String>,
    ) -> SessionError {
        let code = status.as_u16();

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let session_auth = matches!(self.auth, Auth::Session);
            return match attached {
                Some(token) if session_auth => {
                    info!(method = %self.method, path = %self.path, status = code, "Session expired");
                    self.client.session.invalidate_token(&token).await;
                    SessionError::AuthenticationExpired {
                        message: detail.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
                    }
                }
                None if session_auth => {
                    debug!(method = %self.method, path = %self.path, status = code, "Rejected without a session");
                    SessionError::NotAuthenticated
                }
                _ => {
                    debug!(method = %self.method, path = %self.path, status = code, "Credentials rejected");
                    SessionError::InvalidCredentials {
                        message: detail.unwrap_or(self.fallback),
                    }
                }
            };
        }

        warn!(method = %self.method, path = %self.path, status = code, detail = ?detail, "Request rejected");
        let message = detail.unwrap_or(self.fallback);
        if status == StatusCode::NOT_FOUND {
            SessionError::NotFound { message }
        } else if status.is_server_error() {
            SessionError::Server {
                status: code,
                message,
            }
        } else {
            SessionError::Validation {
                status: code,
                message,
            }
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"detail": "..."}`, `{"detail": [{"msg": "..."}, ...]}` (joined
/// with ", ") and `{"message": "..."}`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let detail = match value.get("detail") {
        Some(Value::String(text)) => Some(text.trim().to_string()),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("msg").and_then(Value::as_str),
                })
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .collect();
            Some(parts.join(", "))
        }
        Some(other) => other.get("msg").and_then(Value::as_str).map(str::to_string),
        None => None,
    }
    .filter(|text| !text.is_empty());

    detail.or_else(|| {
        value
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}
