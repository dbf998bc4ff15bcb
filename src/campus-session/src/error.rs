//! Error types for the session core.
//!
//! Presentation code only ever sees a [`SessionError`]: one [`ErrorKind`] plus
//! one human-readable message. Raw transport errors are converted at the
//! HTTP client boundary and storage errors never leave the storage adapter.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Coarse classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    AuthenticationExpired,
    InvalidCredentials,
    Validation,
    NotFound,
    Server,
    LoginInProgress,
    NotAuthenticated,
    ScanInProgress,
    InvalidResponse,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::AuthenticationExpired => "authentication_expired",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Server => "server",
            Self::LoginInProgress => "login_in_progress",
            Self::NotAuthenticated => "not_authenticated",
            Self::ScanInProgress => "scan_in_progress",
            Self::InvalidResponse => "invalid_response",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the session core.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    // Transport errors
    #[error("Network error: {message}")]
    Network { message: String },

    // Authentication errors
    #[error("Session expired: {message}")]
    AuthenticationExpired { message: String },

    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("A sign-in is already in progress")]
    LoginInProgress,

    // Backend rejections
    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    // Scan intake
    #[error("A scan is already being processed")]
    ScanInProgress,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The error kind presented to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::AuthenticationExpired { .. } => ErrorKind::AuthenticationExpired,
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::LoginInProgress => ErrorKind::LoginInProgress,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Server { .. } => ErrorKind::Server,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::ScanInProgress => ErrorKind::ScanInProgress,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// The single user-facing message, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Network { message }
            | Self::AuthenticationExpired { message }
            | Self::InvalidCredentials { message }
            | Self::Validation { message, .. }
            | Self::NotFound { message }
            | Self::Server { message, .. }
            | Self::InvalidResponse { message }
            | Self::Config(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status behind this error, when it came from a backend response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Replace the message while keeping the kind. Unit variants are returned unchanged.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            Self::Network { .. } => Self::Network { message },
            Self::AuthenticationExpired { .. } => Self::AuthenticationExpired { message },
            Self::InvalidCredentials { .. } => Self::InvalidCredentials { message },
            Self::Validation { status, .. } => Self::Validation { status, message },
            Self::NotFound { .. } => Self::NotFound { message },
            Self::Server { status, .. } => Self::Server { status, message },
            Self::InvalidResponse { .. } => Self::InvalidResponse { message },
            Self::Config(_) => Self::Config(message),
            other => other,
        }
    }

    /// Check if this error indicates authentication issues.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationExpired { .. }
                | Self::InvalidCredentials { .. }
                | Self::NotAuthenticated
        )
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("Request timed out: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
