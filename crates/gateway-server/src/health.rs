//! Health reporting.

use axum::http::StatusCode;
use gateway_core::ProviderKind;
use serde::{Deserialize, Serialize};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully healthy
    Healthy,
    /// Serving, but some requests will fail
    Degraded,
    /// Not serving
    Unhealthy,
}

impl HealthStatus {
    /// HTTP status code for this health status
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: HealthStatus,
    /// Crate version
    pub version: String,
    /// Seconds since start
    pub uptime_seconds: u64,
    /// Registered provider clients
    pub providers: usize,
    /// Whether the kill switch is blocking traffic
    pub kill_switch_enabled: bool,
}

/// One provider's reachability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider
    pub provider: ProviderKind,
    /// Whether the health probe succeeded
    pub healthy: bool,
}

/// Overall status from the registered provider count and kill switch.
///
/// No providers means nothing can be served. An active kill switch still
/// answers requests, with a refusal.
#[must_use]
pub const fn assess(providers: usize, kill_switch_enabled: bool) -> HealthStatus {
    if providers == 0 {
        HealthStatus::Unhealthy
    } else if kill_switch_enabled {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
