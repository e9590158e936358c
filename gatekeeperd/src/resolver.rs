//! MAC to device resolution.
//!
//! Registry data comes in several generations: first-class MAC objects, MAC
//! fields on interfaces, a MAC custom field on the device, and devices that
//! were only named after the probe. Strategies run in that order and the first
//! match wins.

use std::fmt;
use std::sync::Arc;
use shared::mac::MacAddress;
use crate::error::RegistryError;
use crate::registry::{DeviceFilter, DeviceRecord, DeviceRef, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    MacObject,
    InterfaceField,
    CustomField,
    NameMatch,
}

impl Strategy {
    pub const CHAIN: [Strategy; 4] = [
        Strategy::MacObject,
        Strategy::InterfaceField,
        Strategy::CustomField,
        Strategy::NameMatch,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::MacObject => "MAC address object",
            Strategy::InterfaceField => "interface MAC field",
            Strategy::CustomField => "device custom field",
            Strategy::NameMatch => "device name",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub device: DeviceRecord,
    pub strategy: Strategy,
}

pub struct DeviceResolver {
    registry: Arc<dyn Registry>,
    mac_field: String,
}

impl DeviceResolver {
    pub fn new(registry: Arc<dyn Registry>, mac_field: impl Into<String>) -> Self {
        Self {
            registry,
            mac_field: mac_field.into(),
        }
    }

    /// Find the device for `mac`, or `None` when no strategy matches.
    ///
    /// Strategies the registry does not support are skipped; any other
    /// registry error aborts the lookup.
    pub async fn resolve(&self, mac: &MacAddress) -> Result<Option<Resolved>, RegistryError> {
        for strategy in Strategy::CHAIN {
            match self.attempt(strategy, mac).await {
                Ok(Some(device)) => {
                    tracing::info!("Found device {} for {} via {}", device.name, mac, strategy);
                    return Ok(Some(Resolved { device, strategy }));
                }
                Ok(None) => {
                    tracing::debug!("No match for {} via {}", mac, strategy);
                }
                Err(e) if e.is_unsupported() => {
                    tracing::debug!("Skipping {} lookup: {}", strategy, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn attempt(&self, strategy: Strategy, mac: &MacAddress) -> Result<Option<DeviceRecord>, RegistryError> {
        match strategy {
            Strategy::MacObject => {
                let objects = self.registry.find_mac_objects(mac).await?;
                let owner = objects.into_iter().find_map(|m| {
                    let interface = m.interface?;
                    let device = interface.device?;
                    tracing::debug!("MAC object {} is on interface {} of {}", m.id, interface.id, device.name);
                    Some(device)
                });
                self.fetch(owner).await
            }
            Strategy::InterfaceField => {
                let interfaces = self.registry.find_interfaces(mac).await?;
                let owner = interfaces.into_iter().find_map(|i| {
                    let device = i.device?;
                    tracing::debug!("Interface {} with {} belongs to {}", i.id, mac, device.name);
                    Some(device)
                });
                self.fetch(owner).await
            }
            Strategy::CustomField => {
                let filter = DeviceFilter::CustomField {
                    name: self.mac_field.clone(),
                    value: mac.to_string(),
                };
                let devices = self.registry.list_devices(&filter).await?;
                // an unknown filter key comes back as the full device list
                Ok(devices.into_iter().find(|d| d.mac.as_ref() == Some(mac)))
            }
            Strategy::NameMatch => {
                let needle = mac.to_hex();
                let devices = self.registry.list_devices(&DeviceFilter::All).await?;
                Ok(devices.into_iter().find(|d| name_contains_mac(&d.name, &needle)))
            }
        }
    }

    /// Back-references only carry id and name; load the full record.
    async fn fetch(&self, owner: Option<DeviceRef>) -> Result<Option<DeviceRecord>, RegistryError> {
        match owner {
            Some(owner) => self.registry.get_device(owner.id).await,
            None => Ok(None),
        }
    }
}

/// `probe-AA-BB-CC-DD-EE-FF` and `probe-aabbccddeeff` both match `aabbccddeeff`.
fn name_contains_mac(name: &str, hex: &str) -> bool {
    let squashed: String = name
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_lowercase();
    squashed.contains(hex)
}
