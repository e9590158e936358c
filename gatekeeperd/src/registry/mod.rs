//! Device registry seam.
//!
//! The registry is the system of record for probes. The service only needs a
//! handful of list/filter/create/update calls, so those are all the trait
//! exposes. `netbox` talks to a real NetBox; `memory` backs the tests.

pub mod netbox;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use shared::mac::MacAddress;
use crate::error::RegistryError;

/// A device as the registry stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: u64,
    pub name: String,
    /// Tunnel port custom field. `None` means known but not provisioned.
    pub assigned_port: Option<u16>,
    /// MAC custom field, when set and parseable
    pub mac: Option<MacAddress>,
    /// Registry-owned; passed through untouched
    pub site: Option<String>,
    pub status: Option<String>,
}

/// Reference to a device embedded in another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub id: u64,
    pub device: Option<DeviceRef>,
}

/// First-class MAC address object and the interface it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacObject {
    pub id: u64,
    pub interface: Option<InterfaceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    All,
    /// Exact match on a custom field value. A registry without the field
    /// may ignore the filter and return every device.
    CustomField { name: String, value: String },
}

/// Fields for a placeholder device reserving a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub name: String,
    pub device_type: String,
    pub role: String,
    pub site: String,
    pub status: String,
    pub assigned_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub assigned_port: Option<u16>,
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Cheap reachability probe
    async fn ping(&self) -> Result<(), RegistryError>;

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, RegistryError>;

    async fn get_device(&self, id: u64) -> Result<Option<DeviceRecord>, RegistryError>;

    async fn create_device(&self, device: &NewDevice) -> Result<DeviceRecord, RegistryError>;

    async fn update_device(&self, id: u64, update: &DeviceUpdate) -> Result<DeviceRecord, RegistryError>;

    /// MAC objects matching `mac`. `Unsupported` when the schema predates them.
    async fn find_mac_objects(&self, mac: &MacAddress) -> Result<Vec<MacObject>, RegistryError>;

    /// Interfaces whose own MAC field matches `mac`.
    async fn find_interfaces(&self, mac: &MacAddress) -> Result<Vec<InterfaceRecord>, RegistryError>;
}
