use std::sync::Arc;
use crate::error::ProvisioningError;
use crate::registry::{DeviceFilter, Registry};

/// Computes the next free tunnel port from what the registry already holds.
///
/// This is a plain read then compute; callers serialize it with the write
/// that follows (see `assignment`).
pub struct PortAllocator {
    registry: Arc<dyn Registry>,
    floor: u16,
}

impl PortAllocator {
    pub fn new(registry: Arc<dyn Registry>, floor: u16) -> Self {
        Self { registry, floor }
    }

    pub async fn next_port(&self) -> Result<u16, ProvisioningError> {
        let devices = self
            .registry
            .list_devices(&DeviceFilter::All)
            .await
            .map_err(ProvisioningError::PortScan)?;

        let assigned = devices.iter().filter_map(|d| d.assigned_port);
        let port = next_after(self.floor, assigned)
            .ok_or(ProvisioningError::PortsExhausted { floor: self.floor })?;

        tracing::debug!("Scanned {} devices, next port is {}", devices.len(), port);
        Ok(port)
    }
}

/// One past the highest assigned port, never below `floor`. Gaps are not reused.
pub fn next_after(floor: u16, assigned: impl IntoIterator<Item = u16>) -> Option<u16> {
    let baseline = floor.saturating_sub(1);
    let highest = assigned.into_iter().fold(baseline, u16::max);
    highest.checked_add(1)
}
