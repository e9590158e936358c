use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use shared::mac::MacAddress;
use crate::allocator::PortAllocator;
use crate::config::ProvisioningConfig;
use crate::error::ProvisioningError;
use crate::registry::{DeviceRecord, DeviceUpdate, NewDevice, Registry};
use crate::resolver::DeviceResolver;

/// Result of a port request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAssignment {
    pub mac: MacAddress,
    pub port: u16,
    /// Port was recorded before this request arrived
    pub existing: bool,
    pub device_name: String,
}

/// What the registry currently knows about a MAC.
#[derive(Debug)]
enum Lookup {
    Assigned(PortAssignment),
    Unassigned(DeviceRecord),
    Missing,
}

/// Resolve-or-allocate logic over one registry.
pub struct Assigner {
    registry: Arc<dyn Registry>,
    resolver: DeviceResolver,
    allocator: PortAllocator,
    provisioning: ProvisioningConfig,
}

impl Assigner {
    pub fn new(registry: Arc<dyn Registry>, provisioning: ProvisioningConfig) -> Self {
        Self {
            resolver: DeviceResolver::new(registry.clone(), provisioning.mac_field.clone()),
            allocator: PortAllocator::new(registry.clone(), provisioning.port_floor),
            registry,
            provisioning,
        }
    }

    /// Name given to placeholder devices, findable later by name match.
    pub fn placeholder_name(&self, mac: &MacAddress) -> String {
        format!("{}{}", self.provisioning.name_prefix, mac.to_hex())
    }

    async fn lookup(&self, mac: &MacAddress) -> Result<Lookup, ProvisioningError> {
        let resolved = self
            .resolver
            .resolve(mac)
            .await
            .map_err(ProvisioningError::Lookup)?;

        Ok(match resolved {
            Some(resolved) => match resolved.device.assigned_port {
                Some(port) => Lookup::Assigned(PortAssignment {
                    mac: *mac,
                    port,
                    existing: true,
                    device_name: resolved.device.name,
                }),
                None => {
                    tracing::info!(
                        "Device {} (via {}, site {}, status {}) has no port yet",
                        resolved.device.name,
                        resolved.strategy,
                        resolved.device.site.as_deref().unwrap_or("-"),
                        resolved.device.status.as_deref().unwrap_or("-"),
                    );
                    Lookup::Unassigned(resolved.device)
                }
            },
            None => Lookup::Missing,
        })
    }

    /// The read-compute-write critical section. Only ever run from the
    /// allocation task, one request at a time.
    async fn allocate(&self, mac: &MacAddress) -> Result<PortAssignment, ProvisioningError> {
        // re-check: a request queued ahead of us may have just written this MAC
        let device = match self.lookup(mac).await? {
            Lookup::Assigned(assignment) => {
                tracing::info!("Port {} for {} was assigned by an earlier request", assignment.port, mac);
                return Ok(assignment);
            }
            Lookup::Unassigned(device) => Some(device),
            Lookup::Missing => None,
        };

        let port = self.allocator.next_port().await?;

        let device_name = match device {
            Some(device) => {
                let update = DeviceUpdate { assigned_port: Some(port) };
                self.registry
                    .update_device(device.id, &update)
                    .await
                    .map_err(|source| ProvisioningError::Write {
                        device: device.name.clone(),
                        port,
                        source,
                    })?;
                tracing::info!("Updated existing device {} with port {}", device.name, port);
                device.name
            }
            None => {
                let new_device = NewDevice {
                    name: self.placeholder_name(mac),
                    device_type: self.provisioning.device_type.clone(),
                    role: self.provisioning.device_role.clone(),
                    site: self.provisioning.pending_site.clone(),
                    status: self.provisioning.pending_status.clone(),
                    assigned_port: port,
                };
                self.registry
                    .create_device(&new_device)
                    .await
                    .map_err(|source| ProvisioningError::Write {
                        device: new_device.name.clone(),
                        port,
                        source,
                    })?;
                tracing::info!("Created pending device {} with port {}", new_device.name, port);
                new_device.name
            }
        };

        Ok(PortAssignment {
            mac: *mac,
            port,
            existing: false,
            device_name,
        })
    }
}

/// Commands sent to the allocation task
enum AssignCommand {
    Allocate(MacAddress, oneshot::Sender<Result<PortAssignment, ProvisioningError>>),
    Shutdown,
}

/// Handle to the port assignment service.
///
/// Lookups of already provisioned MACs run on the caller's task. Anything
/// that needs a new port is queued to a single allocation task, so two
/// requests can never both observe the same highest port.
#[derive(Clone)]
pub struct AssignmentHandle {
    assigner: Arc<Assigner>,
    tx: mpsc::Sender<AssignCommand>,
}

impl AssignmentHandle {
    /// Spawn the allocation task. Must be called inside a tokio runtime.
    pub fn spawn(assigner: Assigner) -> Self {
        let assigner = Arc::new(assigner);
        let (tx, mut rx) = mpsc::channel::<AssignCommand>(64);

        let worker = assigner.clone();
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    AssignCommand::Allocate(mac, reply) => {
                        let result = worker.allocate(&mac).await;
                        let _ = reply.send(result);
                    }
                    AssignCommand::Shutdown => {
                        tracing::info!("Allocation task shutting down");
                        break;
                    }
                }
            }
        });

        Self { assigner, tx }
    }

    /// Return the port recorded for `mac`, allocating one if there is none.
    pub async fn assign(&self, mac: MacAddress) -> Result<PortAssignment, ProvisioningError> {
        if let Lookup::Assigned(assignment) = self.assigner.lookup(&mac).await? {
            tracing::info!("Found existing port {} for {}", assignment.port, mac);
            return Ok(assignment);
        }

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(AssignCommand::Allocate(mac, reply))
            .await
            .map_err(|_| ProvisioningError::AllocatorStopped)?;
        rx.await.map_err(|_| ProvisioningError::AllocatorStopped)?
    }

    /// Stop the allocation task; queued requests ahead of this still complete
    pub async fn shutdown(&self) -> Result<(), ProvisioningError> {
        self.tx
            .send(AssignCommand::Shutdown)
            .await
            .map_err(|_| ProvisioningError::AllocatorStopped)
    }
}
