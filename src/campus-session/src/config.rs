//! Client configuration.
//!
//! Loaded from `<campus_home>/config.toml` (a missing file means defaults),
//! then overridden from the environment:
//! - `CAMPUS_API_BASE_URL`
//! - `CAMPUS_API_TIMEOUT_SECS`
//! - `CAMPUS_STORAGE`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    API_BASE_URL_ENV, API_TIMEOUT_ENV, DEFAULT_API_BASE_URL, DEFAULT_SCAN_SETTLE_MS, STORAGE_ENV,
};
use crate::error::{Result, SessionError};
use crate::storage::StorageKind;
use crate::types::AccessType;

/// Configuration file name inside the campus home.
pub const CONFIG_FILE: &str = "config.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub scan: ScanConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Timeout for the profile fetch that completes a sign-in.
    pub profile_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: campus_common::DEFAULT_TIMEOUT.as_secs(),
            profile_timeout_secs: campus_common::PROFILE_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageKind,
}

/// Scan intake settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub settle_ms: u64,
    pub access_type: AccessType,
    pub location: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SCAN_SETTLE_MS,
            access_type: AccessType::default(),
            location: None,
        }
    }
}

impl ClientConfig {
    /// Load `<home>/config.toml` and apply environment overrides.
    pub fn load(home: &Path) -> Result<Self> {
        let mut config = Self::load_from_path(&home.join(CONFIG_FILE))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&content)?;
        config.normalize()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(API_BASE_URL_ENV) {
            self.api.base_url = url;
        }
        if let Some(secs) = lookup(API_TIMEOUT_ENV) {
            self.api.timeout_secs = secs.trim().parse().map_err(|_| {
                SessionError::config(format!("{API_TIMEOUT_ENV} must be a number of seconds"))
            })?;
        }
        if let Some(kind) = lookup(STORAGE_ENV) {
            self.storage.backend = kind.parse().map_err(SessionError::config)?;
        }

        self.normalize()
    }

    /// Override the base URL (command line flag).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        self.api.base_url = base_url.into();
        self.normalize()?;
        Ok(self)
    }

    fn normalize(&mut self) -> Result<()> {
        let trimmed = self.api.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SessionError::config("api.base_url must not be empty"));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(SessionError::config(format!(
                "api.base_url must start with http:// or https:// (got '{trimmed}')"
            )));
        }
        self.api.base_url = trimmed.to_string();

        if self.api.timeout_secs == 0 || self.api.profile_timeout_secs == 0 {
            return Err(SessionError::config("timeouts must be at least one second"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.api.profile_timeout_secs)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.scan.settle_ms)
    }
}
