// # Health Status
//
// Process-wide record of the last known health state.
//
// ## Ownership
//
// - Written only by the `SyncEngine`
// - Read by the health endpoint, concurrently and at any time
// - Shared as `Arc<HealthStatus>`, injected into both at startup
//
// Every read and write takes the same mutex, so a reader never sees
// `healthy=true` paired with a stale reason.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Reason reported before the first health update
pub const STARTING_UP: &str = "Starting up";

/// Reason fragment when the gateway cannot be reached
pub const GATEWAY_UNREACHABLE: &str = "Gateway unreachable";

/// Reason fragment when the client cannot be reached
pub const CLIENT_UNREACHABLE: &str = "Client unreachable";

#[derive(Debug)]
struct Inner {
    healthy: bool,
    reason: String,
    gateway_reachable: bool,
    client_reachable: bool,
}

/// Thread-safe health state container
#[derive(Debug)]
pub struct HealthStatus {
    inner: Mutex<Inner>,
}

/// Consistent point-in-time view of the health state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Whether the process considers itself healthy
    pub healthy: bool,
    /// Human-readable reason, empty when healthy
    pub reason: String,
}

/// Body served by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthStatus {
    /// Create the status in its initial state: unhealthy, "Starting up"
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                healthy: false,
                reason: STARTING_UP.to_string(),
                gateway_reachable: false,
                client_reachable: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The guarded data stays consistent even if a writer panicked,
        // every write replaces whole fields.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Unconditionally override the health flag and reason
    ///
    /// Used for fatal and authentication-class failures. The override holds
    /// until the next [`HealthStatus::set_service_status`] call.
    pub fn set_healthy(&self, healthy: bool, reason: impl Into<String>) {
        let mut inner = self.lock();
        inner.healthy = healthy;
        inner.reason = reason.into();
    }

    /// Record service reachability and recompute health from it
    pub fn set_service_status(&self, gateway_ok: bool, client_ok: bool) {
        let mut inner = self.lock();
        inner.gateway_reachable = gateway_ok;
        inner.client_reachable = client_ok;
        inner.healthy = gateway_ok && client_ok;

        let mut reasons = Vec::new();
        if !gateway_ok {
            reasons.push(GATEWAY_UNREACHABLE);
        }
        if !client_ok {
            reasons.push(CLIENT_UNREACHABLE);
        }
        inner.reason = reasons.join(", ");
    }

    /// Current health flag and reason, read atomically
    pub fn status(&self) -> HealthSnapshot {
        let inner = self.lock();
        HealthSnapshot {
            healthy: inner.healthy,
            reason: inner.reason.clone(),
        }
    }

    /// Last recorded gateway reachability
    pub fn gateway_reachable(&self) -> bool {
        self.lock().gateway_reachable
    }

    /// Last recorded client reachability
    pub fn client_reachable(&self) -> bool {
        self.lock().client_reachable
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSnapshot {
    /// Render the snapshot as a health response body
    pub fn report(&self) -> HealthReport {
        if self.healthy {
            HealthReport {
                status: "healthy",
                reason: None,
            }
        } else {
            HealthReport {
                status: "unhealthy",
                reason: Some(self.reason.clone()),
            }
        }
    }
}
