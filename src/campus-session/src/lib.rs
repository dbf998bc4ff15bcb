//! Campus Session - session and authentication core for the campus access client.
//!
//! - [`SessionStore`] owns the current credential and the status machine
//! - [`ApiClient`] attaches the credential to every request and turns a
//!   rejected token into an invalidation
//! - [`AuthInvalidationBus`] tells observers the session is gone
//! - [`StorageAdapter`] persists exactly one secret, the bearer token
//! - [`ScanGate`] keeps repeated camera detections from submitting twice
//!
//! Security features:
//! - OS keychain integration (Windows Credential Manager, macOS Keychain, Linux Secret Service)
//! - Encrypted file storage with AES-256-GCM
//! - Tokens held as `SecretString` and never logged

// Core modules
pub mod constants;
pub mod error;
pub mod types;
mod utils;

// Configuration
pub mod config;

// Storage backends
pub mod storage;

// Session machinery
pub mod bus;
pub mod client;
mod session;

// Scan intake and endpoint wrappers
pub mod scan_gate;
pub mod services;

pub use bus::{AuthInvalidationBus, EventBus, InvalidationReason, StatusListeners, Subscription};
pub use client::{ApiClient, ApiRequest};
pub use config::{ApiConfig, ClientConfig, ScanConfig, StorageConfig};
pub use error::{ErrorKind, Result, SessionError};
pub use scan_gate::{ScanBusy, ScanGate};
pub use services::{AccessService, DEFAULT_HISTORY_LIMIT, DeviceService};
pub use session::SessionStore;
pub use storage::{StorageAdapter, StorageBackend, StorageError, StorageKind};
pub use types::{
    AccessRecord, AccessType, Device, DeviceQr, DeviceUpdate, DeviceWithQr, NewDevice,
    ProfileUpdate, SessionStatus, UserProfile,
};
pub use utils::mask_token;
