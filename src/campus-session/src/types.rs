//! Type definitions for session state and backend payloads.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authentication status of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No credential.
    #[default]
    Anonymous,
    /// A login, registration or startup hydration is in flight.
    Authenticating,
    /// Token stored and profile resolved.
    Authenticated,
    /// The credential was rejected and is being cleared.
    Invalidated,
}

impl SessionStatus {
    /// True for the states where invalidation has nothing left to do.
    pub fn is_signed_out(&self) -> bool {
        matches!(self, Self::Anonymous | Self::Invalidated)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Invalidated => write!(f, "invalidated"),
        }
    }
}

/// In-memory session, owned by the session store.
///
/// `token` is set while authenticating and once authenticated; `user` only
/// once authenticated.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub status: SessionStatus,
    pub token: Option<SecretString>,
    pub user: Option<UserProfile>,
    /// Bumped on every logout/invalidation so in-flight sign-ins can tell
    /// their session was closed underneath them.
    pub epoch: u64,
}

/// Identity returned by `GET /users/me`.
///
/// Never persisted: it may carry a large embedded photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub student_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /auth/login` and `POST /auth/register` responses.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Embedded user; the profile is always re-fetched from `/users/me`.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub student_id: &'a str,
}

/// Partial profile update for `PUT /users/me`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.profile_photo.is_none()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordChange<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

/// Direction of an access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Entrada,
    Salida,
}

impl std::str::FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entrada" | "entry" | "in" => Ok(Self::Entrada),
            "salida" | "exit" | "out" => Ok(Self::Salida),
            other => Err(format!("unknown access type '{other}'")),
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entrada => write!(f, "entrada"),
            Self::Salida => write!(f, "salida"),
        }
    }
}

/// Body of `POST /access/scan`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRequest {
    pub qr_data: String,
    pub access_type: AccessType,
    pub location: Option<String>,
}

/// Access record returned by the scan and history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub device_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub access_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_serial_number: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub device_type: String,
    pub serial_number: String,
    pub qr_data: String,
    #[serde(default)]
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /devices/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewDevice {
    pub name: String,
    pub device_type: String,
    pub serial_number: String,
}

/// Body of `PUT /devices/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// Response of `GET /devices/{id}/qr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceQr {
    pub device_id: String,
    pub qr_data: String,
    #[serde(default)]
    pub qr_image_base64: Option<String>,
}

/// Response of `POST /devices/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceWithQr {
    pub device: Device,
    pub qr_image_base64: String,
}
