use thiserror::Error;

/// Failures talking to the device registry.
///
/// Messages carry the endpoint and cause but never request headers, so the
/// registry token cannot end up in a response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry schema has no such object or filter (older version)
    #[error("registry does not support {0}")]
    Unsupported(String),

    #[error("registry request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("registry returned {status} for {endpoint}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("registry request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("unexpected registry response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl RegistryError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RegistryError::Unsupported(_))
    }
}

/// Failures while resolving or allocating a port for a probe.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    #[error("device lookup failed: {0}")]
    Lookup(RegistryError),

    #[error("reading assigned ports failed: {0}")]
    PortScan(RegistryError),

    /// The write may have partially landed; a repeated request converges
    #[error("recording port {port} on device {device} failed: {source}")]
    Write {
        device: String,
        port: u16,
        source: RegistryError,
    },

    #[error("no port left to allocate above floor {floor}")]
    PortsExhausted { floor: u16 },

    #[error("port allocator is not running")]
    AllocatorStopped,
}
