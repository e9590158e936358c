use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::mac::MacAddress;

/// Answer to a port request.
/// This is the JSON body the bootstrap client reads its tunnel port from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortResponse {
    /// Canonical probe MAC
    pub mac: MacAddress,

    /// Reverse tunnel port on the proxy host
    pub port: u16,

    /// True when the port was already recorded before this request
    pub existing: bool,

    /// Registry device the port is recorded on
    pub device_name: String,

    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub registry_connected: bool,
    pub timestamp: DateTime<Utc>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
