//! In-memory registry for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use shared::mac::MacAddress;
use crate::error::RegistryError;
use super::{
    DeviceFilter, DeviceRecord, DeviceRef, DeviceUpdate, InterfaceRecord, MacObject, NewDevice,
    Registry,
};

#[derive(Debug, Clone)]
struct StoredDevice {
    record: DeviceRecord,
    custom_fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredInterface {
    id: u64,
    mac: Option<MacAddress>,
    device_id: u64,
}

#[derive(Debug, Clone)]
struct StoredMacObject {
    id: u64,
    mac: MacAddress,
    interface_id: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    devices: Vec<StoredDevice>,
    interfaces: Vec<StoredInterface>,
    mac_objects: Vec<StoredMacObject>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn device_ref(&self, id: u64) -> Option<DeviceRef> {
        self.devices.iter().find(|d| d.record.id == id).map(|d| DeviceRef {
            id,
            name: d.record.name.clone(),
        })
    }

    fn interface(&self, id: u64) -> Option<InterfaceRecord> {
        self.interfaces.iter().find(|i| i.id == id).map(|i| InterfaceRecord {
            id: i.id,
            device: self.device_ref(i.device_id),
        })
    }
}

/// Registry double. Switches simulate older schemas and outages.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<State>,
    /// No first-class MAC objects, like NetBox before 4.2
    legacy_schema: bool,
    /// Answer custom field filters with every device, as NetBox does for a
    /// field it does not know
    ignore_filters: bool,
    offline: AtomicBool,
    fail_writes: AtomicBool,
    latency: Option<Duration>,
    writes: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legacy() -> Self {
        Self {
            legacy_schema: true,
            ..Self::default()
        }
    }

    pub fn ignoring_filters(mut self) -> Self {
        self.ignore_filters = true;
        self
    }

    /// Sleep before every call so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of create/update calls that succeeded
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn add_device(&self, name: &str, assigned_port: Option<u16>) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.devices.push(StoredDevice {
            record: DeviceRecord {
                id,
                name: name.to_string(),
                assigned_port,
                mac: None,
                site: Some("remote-site".to_string()),
                status: Some("active".to_string()),
            },
            custom_fields: HashMap::new(),
        });
        id
    }

    /// Record `mac` in the device's custom field `name`.
    pub fn set_mac_field(&self, device_id: u64, name: &str, mac: MacAddress) {
        let mut state = self.state.lock().unwrap();
        if let Some(device) = state.devices.iter_mut().find(|d| d.record.id == device_id) {
            device.custom_fields.insert(name.to_string(), mac.to_string());
            device.record.mac = Some(mac);
        }
    }

    /// Interface carrying the MAC in its own field (pre-4.2 layout)
    pub fn add_interface(&self, device_id: u64, mac: Option<MacAddress>) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.interfaces.push(StoredInterface { id, mac, device_id });
        id
    }

    pub fn add_mac_object(&self, mac: MacAddress, interface_id: Option<u64>) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.mac_objects.push(StoredMacObject { id, mac, interface_id });
        id
    }

    pub fn devices(&self) -> Vec<DeviceRecord> {
        let state = self.state.lock().unwrap();
        state.devices.iter().map(|d| d.record.clone()).collect()
    }

    pub fn device_named(&self, name: &str) -> Option<DeviceRecord> {
        self.devices().into_iter().find(|d| d.name == name)
    }

    async fn call(&self, endpoint: &str) -> Result<(), RegistryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RegistryError::Transport {
                endpoint: endpoint.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn write_call(&self, endpoint: &str) -> Result<(), RegistryError> {
        self.call(endpoint).await?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RegistryError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn ping(&self) -> Result<(), RegistryError> {
        self.call("status").await
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, RegistryError> {
        self.call("devices").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .devices
            .iter()
            .filter(|d| match filter {
                DeviceFilter::All => true,
                DeviceFilter::CustomField { .. } if self.ignore_filters => true,
                DeviceFilter::CustomField { name, value } => d.custom_fields.get(name) == Some(value),
            })
            .map(|d| d.record.clone())
            .collect())
    }

    async fn get_device(&self, id: u64) -> Result<Option<DeviceRecord>, RegistryError> {
        self.call("devices").await?;
        let state = self.state.lock().unwrap();
        Ok(state.devices.iter().find(|d| d.record.id == id).map(|d| d.record.clone()))
    }

    async fn create_device(&self, device: &NewDevice) -> Result<DeviceRecord, RegistryError> {
        self.write_call("devices").await?;
        let mut state = self.state.lock().unwrap();
        if state.devices.iter().any(|d| d.record.name == device.name) {
            return Err(RegistryError::Status {
                endpoint: "devices".to_string(),
                status: 400,
                message: format!("device with name {} already exists", device.name),
            });
        }

        let id = state.next_id();
        let record = DeviceRecord {
            id,
            name: device.name.clone(),
            assigned_port: Some(device.assigned_port),
            mac: None,
            site: Some(device.site.clone()),
            status: Some(device.status.clone()),
        };
        state.devices.push(StoredDevice {
            record: record.clone(),
            custom_fields: HashMap::new(),
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update_device(&self, id: u64, update: &DeviceUpdate) -> Result<DeviceRecord, RegistryError> {
        self.write_call("devices").await?;
        let mut state = self.state.lock().unwrap();
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.record.id == id)
            .ok_or_else(|| RegistryError::Status {
                endpoint: "devices".to_string(),
                status: 404,
                message: "Not Found".to_string(),
            })?;
        device.record.assigned_port = update.assigned_port;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(device.record.clone())
    }

    async fn find_mac_objects(&self, mac: &MacAddress) -> Result<Vec<MacObject>, RegistryError> {
        self.call("mac-addresses").await?;
        if self.legacy_schema {
            return Err(RegistryError::Unsupported("MAC address objects".to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .mac_objects
            .iter()
            .filter(|m| m.mac == *mac)
            .map(|m| MacObject {
                id: m.id,
                interface: m.interface_id.and_then(|id| state.interface(id)),
            })
            .collect())
    }

    async fn find_interfaces(&self, mac: &MacAddress) -> Result<Vec<InterfaceRecord>, RegistryError> {
        self.call("interfaces").await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .interfaces
            .iter()
            .filter(|i| i.mac.as_ref() == Some(mac))
            .filter_map(|i| state.interface(i.id))
            .collect())
    }
}
