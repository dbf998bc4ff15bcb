//! Typed wrappers over the access and device endpoints.
//!
//! No business rules live here; the only logic is scan single-flight and the
//! user-facing messages for scan failures.

use reqwest::Method;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::config::ScanConfig;
use crate::constants::endpoints;
use crate::error::{Result, SessionError};
use crate::scan_gate::ScanGate;
use crate::types::{
    AccessRecord, AccessType, Device, DeviceQr, DeviceUpdate, DeviceWithQr, NewDevice,
    ScanRequest,
};

/// History page size used by the backend when none is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

const SCAN_FALLBACK: &str = "Failed to record access";

/// Access recording and history.
#[derive(Debug, Clone)]
pub struct AccessService {
    api: ApiClient,
    gate: ScanGate,
    access_type: AccessType,
    location: Option<String>,
}

impl AccessService {
    pub fn new(api: ApiClient, config: &ScanConfig) -> Self {
        Self {
            api,
            gate: ScanGate::new(std::time::Duration::from_millis(config.settle_ms)),
            access_type: config.access_type,
            location: config.location.clone(),
        }
    }

    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn gate(&self) -> &ScanGate {
        &self.gate
    }

    /// Submit a scanned code. Rejected with `ScanInProgress`, without any
    /// request, while a previous scan is in flight or settling.
    pub async fn record_scan(&self, qr_data: &str) -> Result<AccessRecord> {
        let body = ScanRequest {
            qr_data: qr_data.trim().to_string(),
            access_type: self.access_type,
            location: self.location.clone(),
        };

        let outcome = self
            .gate
            .attempt(|| async {
                self.api
                    .request(Method::POST, endpoints::ACCESS_SCAN)
                    .json(&body)?
                    .fallback(SCAN_FALLBACK)
                    .send::<AccessRecord>()
                    .await
            })
            .await
            .map_err(|_| SessionError::ScanInProgress)?;

        match outcome {
            Ok(record) => {
                tracing::info!(access_type = %record.access_type, device = ?record.device_name, "Access recorded");
                Ok(record)
            }
            Err(e) => Err(scan_error(e)),
        }
    }

    /// Access history of the signed-in user, newest first.
    pub async fn history(&self, limit: u32) -> Result<Vec<AccessRecord>> {
        self.api
            .request(Method::GET, endpoints::ACCESS_HISTORY)
            .query("limit", limit)
            .fallback("Failed to load access history")
            .send()
            .await
    }

    /// Access history of one device.
    pub async fn device_history(&self, device_id: Uuid, limit: u32) -> Result<Vec<AccessRecord>> {
        self.api
            .request(Method::GET, endpoints::device_history(&device_id.to_string()))
            .query("limit", limit)
            .fallback("Failed to load access history")
            .send()
            .await
    }
}

/// Map a scan failure to the message shown at the gate.
fn scan_error(err: SessionError) -> SessionError {
    if err.is_auth_error() {
        return err.with_message("You are not allowed to record this access");
    }

    if matches!(err, SessionError::Network { .. }) {
        return err;
    }
    if matches!(err, SessionError::NotFound { .. })
        || err.message().to_lowercase().contains("not found")
    {
        return err.with_message("Invalid QR code or device not found");
    }
    if matches!(&err, SessionError::Validation { status: 400, message } if message == SCAN_FALLBACK)
    {
        return err.with_message("Invalid data in QR code");
    }
    err
}

/// Device CRUD for the signed-in user.
#[derive(Debug, Clone)]
pub struct DeviceService {
    api: ApiClient,
}

impl DeviceService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<Device>> {
        self.api
            .request(Method::GET, endpoints::DEVICES)
            .fallback("Failed to load devices")
            .send()
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Device> {
        self.api
            .request(Method::GET, endpoints::device(&id.to_string()))
            .fallback("Failed to load device")
            .send()
            .await
    }

    pub async fn qr(&self, id: Uuid) -> Result<DeviceQr> {
        self.api
            .request(Method::GET, endpoints::device_qr(&id.to_string()))
            .fallback("Failed to load QR")
            .send()
            .await
    }

    /// Register a device. The response carries the generated QR image.
    pub async fn create(&self, device: &NewDevice) -> Result<DeviceWithQr> {
        self.api
            .request(Method::POST, endpoints::DEVICES)
            .json(device)?
            .fallback("Failed to create device")
            .send()
            .await
    }

    pub async fn update(&self, id: Uuid, changes: &DeviceUpdate) -> Result<Device> {
        self.api
            .request(Method::PUT, endpoints::device(&id.to_string()))
            .json(changes)?
            .fallback("Failed to update device")
            .send()
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.api
            .request(Method::DELETE, endpoints::device(&id.to_string()))
            .fallback("Failed to delete device")
            .send_empty()
            .await
    }
}
