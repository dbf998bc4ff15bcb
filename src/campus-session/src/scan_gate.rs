//! Single-flight guard for scan submissions.
//!
//! A camera feed reports the same code several times per second. The gate
//! lets one submission through, then stays closed while it runs and for a
//! settle window after it finishes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

use crate::constants::DEFAULT_SCAN_SETTLE_MS;

/// Returned when the gate is closed. The operation was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("A scan is already being processed")]
pub struct ScanBusy;

#[derive(Debug, Clone, Copy)]
enum GateState {
    Idle,
    InFlight,
    Settling { until: Instant },
}

/// Cheap to clone; clones share the same gate.
#[derive(Debug, Clone)]
pub struct ScanGate {
    settle: Duration,
    state: Arc<Mutex<GateState>>,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_SCAN_SETTLE_MS))
    }
}

impl ScanGate {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            state: Arc::new(Mutex::new(GateState::Idle)),
        }
    }

    pub fn settle_window(&self) -> Duration {
        self.settle
    }

    /// True while a submission runs or its settle window is open.
    pub fn is_busy(&self) -> bool {
        match *self.state.lock() {
            GateState::Idle => false,
            GateState::InFlight => true,
            GateState::Settling { until } => Instant::now() < until,
        }
    }

    /// Run `op` if the gate is open, otherwise reject without calling it.
    ///
    /// The result is returned as soon as `op` finishes; the gate stays closed
    /// for the settle window after that.
    pub async fn attempt<F, Fut, T>(&self, op: F) -> Result<T, ScanBusy>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = self.try_acquire()?;
        let output = op().await;
        drop(permit);
        Ok(output)
    }

    fn try_acquire(&self) -> Result<Permit<'_>, ScanBusy> {
        let mut state = self.state.lock();
        let open = match *state {
            GateState::Idle => true,
            GateState::InFlight => false,
            GateState::Settling { until } => Instant::now() >= until,
        };
        if !open {
            tracing::debug!("Scan ignored, previous scan still in progress");
            return Err(ScanBusy);
        }
        *state = GateState::InFlight;
        Ok(Permit { gate: self })
    }
}

/// Moves the gate into its settle window when dropped, including when the
/// operation is cancelled or panics.
struct Permit<'a> {
    gate: &'a ScanGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        *self.gate.state.lock() = GateState::Settling {
            until: Instant::now() + self.gate.settle,
        };
    }
}
