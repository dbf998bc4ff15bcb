//! Constants for the campus-session crate.

/// The single durable slot holding the raw bearer token.
pub const TOKEN_KEY: &str = "authToken";

/// Slot used by older builds to persist the profile; cleared on startup.
pub const LEGACY_USER_KEY: &str = "userData";

/// Service name for keyring storage.
pub const KEYRING_SERVICE: &str = "campus-access";

/// File name of the encrypted session store inside the campus home.
pub const ENCRYPTED_STORE_FILE: &str = "session.enc";

/// Default backend base URL (all endpoint paths are relative to it).
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable overriding the backend base URL.
pub const API_BASE_URL_ENV: &str = "CAMPUS_API_BASE_URL";

/// Environment variable overriding the request timeout in seconds.
pub const API_TIMEOUT_ENV: &str = "CAMPUS_API_TIMEOUT_SECS";

/// Environment variable selecting the storage backend.
pub const STORAGE_ENV: &str = "CAMPUS_STORAGE";

/// Settle window applied after each scan submission.
pub const DEFAULT_SCAN_SETTLE_MS: u64 = 1500;

/// Backend endpoint paths.
pub mod endpoints {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const PROFILE: &str = "/users/me";
    pub const CHANGE_PASSWORD: &str = "/users/me/password";
    pub const PASSWORD_RESET: &str = "/users/password/reset-request";
    pub const DEVICES: &str = "/devices/";
    pub const ACCESS_SCAN: &str = "/access/scan";
    pub const ACCESS_HISTORY: &str = "/access/history";

    pub fn device(id: &str) -> String {
        format!("/devices/{id}")
    }

    pub fn device_qr(id: &str) -> String {
        format!("/devices/{id}/qr")
    }

    pub fn device_history(id: &str) -> String {
        format!("/access/device/{id}/history")
    }
}
