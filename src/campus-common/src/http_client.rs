//! Centralized HTTP client factory for the campus access client.
//!
//! Every outbound call to the backend goes through a client built here so
//! that user agent, timeouts and connection pooling stay consistent:
//! - `create_default_client()` - Standard 30s timeout
//! - `create_client_with_timeout(duration)` - Custom timeout
//!
//! The profile lookup performed right after sign-in uses the shorter
//! [`PROFILE_TIMEOUT`] per request rather than a separate client.

use reqwest::Client;
use std::time::Duration;

/// User-Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("campus-cli/", env!("CARGO_PKG_VERSION"));

/// Default timeout for standard API requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the profile fetch that validates a fresh token (10 seconds)
pub const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout applied to every client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle pooled connections are dropped after this long so DNS changes are
/// picked up on long-running clients.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with default configuration (30s timeout).
pub fn create_default_client() -> Result<Client, String> {
    create_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Creates an HTTP client with a custom overall request timeout.
///
/// All clients include:
/// - User-Agent: `campus-cli/{version}`
/// - tcp_nodelay: true
/// - pool_idle_timeout: 60s
/// - connect timeout capped at the request timeout
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client, String> {
    create_client_builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}

/// Creates an HTTP client builder with standard configuration.
///
/// Use this when you need to customize the client further before building.
pub fn create_client_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
}
