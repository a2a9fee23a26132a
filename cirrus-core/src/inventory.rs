use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{CirrusError, CirrusResult};
use crate::types::{
    ClusterConfigDelta, ClusterConfigInfo, ClusterHandle, ClusterProperties, ConfigPayload,
    DrsVmOverride, ManagedRef, VmHandle, VmProperties,
};

/// Abstract interface to the platform inventory and cluster configuration API.
///
/// This trait decouples the reconciliation logic from the concrete platform
/// client. Implementations talk to the real management endpoint; the
/// [`SimInventory`] in this module provides an in-memory stand-in for tests.
///
/// Lookup methods return `NotFound` when the object does not exist; callers
/// add their own context about which lookup was being performed. All calls
/// are synchronous from the caller's point of view: `reconfigure` returning
/// `Ok` means the platform accepted the delta, not that the cluster has
/// finished applying it.
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Verify the endpoint exposes the cluster-configuration API at all.
    ///
    /// Host-only management endpoints accept sessions but cannot reconfigure
    /// clusters; every operation gates on this before doing any lookups.
    async fn ensure_cluster_api(&self) -> CirrusResult<()>;

    /// Resolve a cluster from its managed object id.
    async fn cluster_by_id(&self, id: &str) -> CirrusResult<ClusterHandle>;

    /// Resolve a cluster from its inventory path.
    async fn cluster_by_path(&self, path: &str) -> CirrusResult<ClusterHandle>;

    /// Resolve a virtual machine from its stable instance UUID.
    async fn vm_by_uuid(&self, uuid: &str) -> CirrusResult<VmHandle>;

    /// Resolve a virtual machine from its inventory path.
    async fn vm_by_path(&self, path: &str) -> CirrusResult<VmHandle>;

    /// Fetch current properties of a virtual machine.
    async fn vm_properties(&self, vm: &VmHandle) -> CirrusResult<VmProperties>;

    /// Fetch current properties of a cluster, including its full
    /// configuration payload. No partial fetch; callers scan the result.
    async fn cluster_properties(&self, cluster: &ClusterHandle)
        -> CirrusResult<ClusterProperties>;

    /// Submit one configuration delta against a cluster.
    async fn reconfigure(
        &self,
        cluster: &ClusterHandle,
        delta: ClusterConfigDelta,
    ) -> CirrusResult<()>;
}

#[derive(Debug, Clone)]
struct SimCluster {
    name: String,
    path: String,
    overrides: Vec<DrsVmOverride>,
    /// When set, cluster_properties reports this opaque extension shape
    /// instead of the typed cluster configuration.
    opaque_payload: Option<String>,
}

#[derive(Debug, Clone)]
struct SimVm {
    name: String,
    path: String,
    uuid: String,
}

#[derive(Debug, Default)]
struct SimState {
    clusters: HashMap<String, SimCluster>,
    vms: HashMap<String, SimVm>,
    cluster_api_available: bool,
}

/// In-memory inventory for testing.
///
/// Implements the same add-means-replace and remove-by-key delta semantics
/// as the remote platform, so reconciliation logic can be exercised without
/// a management endpoint.
pub struct SimInventory {
    state: RwLock<SimState>,
}

impl SimInventory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SimState {
                cluster_api_available: true,
                ..Default::default()
            }),
        }
    }

    /// Simulate a host-only endpoint that lacks the cluster API.
    pub fn without_cluster_api() -> Self {
        Self {
            state: RwLock::new(SimState::default()),
        }
    }

    /// Register a cluster and return a handle to it.
    pub fn add_cluster(&self, id: &str, name: &str, path: &str) -> ClusterHandle {
        let mut state = self.state.write().expect("sim inventory lock");
        state.clusters.insert(
            id.to_string(),
            SimCluster {
                name: name.to_string(),
                path: path.to_string(),
                overrides: Vec::new(),
                opaque_payload: None,
            },
        );
        ClusterHandle::new(ManagedRef::cluster(id), name)
    }

    /// Register a VM with a freshly generated instance UUID.
    pub fn add_vm(&self, id: &str, name: &str, path: &str) -> (VmHandle, String) {
        let uuid = Uuid::new_v4().to_string();
        let handle = self.add_vm_with_uuid(id, name, path, &uuid);
        (handle, uuid)
    }

    /// Register a VM with a caller-chosen instance UUID.
    pub fn add_vm_with_uuid(&self, id: &str, name: &str, path: &str, uuid: &str) -> VmHandle {
        let mut state = self.state.write().expect("sim inventory lock");
        state.vms.insert(
            id.to_string(),
            SimVm {
                name: name.to_string(),
                path: path.to_string(),
                uuid: uuid.to_string(),
            },
        );
        VmHandle::new(ManagedRef::vm(id), name)
    }

    /// Make a cluster report an opaque configuration payload.
    pub fn set_opaque_payload(&self, cluster_id: &str, kind: &str) {
        let mut state = self.state.write().expect("sim inventory lock");
        if let Some(cluster) = state.clusters.get_mut(cluster_id) {
            cluster.opaque_payload = Some(kind.to_string());
        }
    }

    /// Drop the override entry for a VM out from under the controller,
    /// simulating an out-of-band change on the platform.
    pub fn remove_override_out_of_band(&self, cluster_id: &str, vm_ref: &ManagedRef) {
        let mut state = self.state.write().expect("sim inventory lock");
        if let Some(cluster) = state.clusters.get_mut(cluster_id) {
            cluster.overrides.retain(|entry| &entry.key != vm_ref);
        }
    }

    /// Current override list for a cluster, for test assertions.
    pub fn overrides(&self, cluster_id: &str) -> Vec<DrsVmOverride> {
        let state = self.state.read().expect("sim inventory lock");
        state
            .clusters
            .get(cluster_id)
            .map(|cluster| cluster.overrides.clone())
            .unwrap_or_default()
    }
}

impl Default for SimInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterInventory for SimInventory {
    async fn ensure_cluster_api(&self) -> CirrusResult<()> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        if state.cluster_api_available {
            Ok(())
        } else {
            Err(CirrusError::UnsupportedEndpoint {
                message: "endpoint is a standalone host, not a management server".to_string(),
            })
        }
    }

    async fn cluster_by_id(&self, id: &str) -> CirrusResult<ClusterHandle> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        state
            .clusters
            .get(id)
            .map(|cluster| ClusterHandle::new(ManagedRef::cluster(id), &cluster.name))
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("cluster {}", id),
            })
    }

    async fn cluster_by_path(&self, path: &str) -> CirrusResult<ClusterHandle> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        state
            .clusters
            .iter()
            .find(|(_, cluster)| cluster.path == path)
            .map(|(id, cluster)| ClusterHandle::new(ManagedRef::cluster(id), &cluster.name))
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("cluster at path {}", path),
            })
    }

    async fn vm_by_uuid(&self, uuid: &str) -> CirrusResult<VmHandle> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        state
            .vms
            .iter()
            .find(|(_, vm)| vm.uuid == uuid)
            .map(|(id, vm)| VmHandle::new(ManagedRef::vm(id), &vm.name))
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("virtual machine with uuid {}", uuid),
            })
    }

    async fn vm_by_path(&self, path: &str) -> CirrusResult<VmHandle> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        state
            .vms
            .iter()
            .find(|(_, vm)| vm.path == path)
            .map(|(id, vm)| VmHandle::new(ManagedRef::vm(id), &vm.name))
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("virtual machine at path {}", path),
            })
    }

    async fn vm_properties(&self, vm: &VmHandle) -> CirrusResult<VmProperties> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        state
            .vms
            .get(&vm.reference.value)
            .map(|sim_vm| VmProperties {
                uuid: sim_vm.uuid.clone(),
                name: sim_vm.name.clone(),
            })
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("virtual machine {}", vm.reference),
            })
    }

    async fn cluster_properties(
        &self,
        cluster: &ClusterHandle,
    ) -> CirrusResult<ClusterProperties> {
        let state = self
            .state
            .read()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        let sim_cluster = state.clusters.get(&cluster.reference.value).ok_or_else(|| {
            CirrusError::NotFound {
                resource: format!("cluster {}", cluster.reference),
            }
        })?;

        let configuration = match &sim_cluster.opaque_payload {
            Some(kind) => ConfigPayload::Opaque(kind.clone()),
            None => ConfigPayload::Cluster(ClusterConfigInfo {
                drs_vm_overrides: sim_cluster.overrides.clone(),
            }),
        };

        Ok(ClusterProperties {
            name: sim_cluster.name.clone(),
            configuration,
        })
    }

    async fn reconfigure(
        &self,
        cluster: &ClusterHandle,
        delta: ClusterConfigDelta,
    ) -> CirrusResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CirrusError::lock_poisoned("sim inventory"))?;
        let sim_cluster = state
            .clusters
            .get_mut(&cluster.reference.value)
            .ok_or_else(|| CirrusError::NotFound {
                resource: format!("cluster {}", cluster.reference),
            })?;

        match delta {
            ClusterConfigDelta::UpsertOverride(entry) => {
                tracing::debug!(
                    "Sim: upserting DRS override for {} in cluster '{}'",
                    entry.key,
                    sim_cluster.name
                );
                // Add on this list type replaces a same-key entry in place.
                match sim_cluster
                    .overrides
                    .iter_mut()
                    .find(|existing| existing.key == entry.key)
                {
                    Some(existing) => *existing = entry,
                    None => sim_cluster.overrides.push(entry),
                }
            }
            ClusterConfigDelta::RemoveOverride(key) => {
                tracing::debug!(
                    "Sim: removing DRS override for {} in cluster '{}'",
                    key,
                    sim_cluster.name
                );
                // Removing an absent key is accepted, matching the platform.
                sim_cluster.overrides.retain(|entry| entry.key != key);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DrsBehavior;
    use pretty_assertions::assert_eq;

    fn override_for(vm_ref: ManagedRef, behavior: DrsBehavior) -> DrsVmOverride {
        DrsVmOverride {
            key: vm_ref,
            enabled: true,
            behavior,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key_entry() {
        let inventory = SimInventory::new();
        let cluster = inventory.add_cluster("domain-c7", "cluster1", "/dc1/host/cluster1");
        let vm = inventory.add_vm_with_uuid("vm-10", "web1", "/dc1/vm/web1", "u-1");

        inventory
            .reconfigure(
                &cluster,
                ClusterConfigDelta::UpsertOverride(override_for(
                    vm.reference.clone(),
                    DrsBehavior::Manual,
                )),
            )
            .await
            .unwrap();
        inventory
            .reconfigure(
                &cluster,
                ClusterConfigDelta::UpsertOverride(override_for(
                    vm.reference.clone(),
                    DrsBehavior::FullyAutomated,
                )),
            )
            .await
            .unwrap();

        let overrides = inventory.overrides("domain-c7");
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].behavior, DrsBehavior::FullyAutomated);
    }

    #[tokio::test]
    async fn test_remove_of_absent_key_is_accepted() {
        let inventory = SimInventory::new();
        let cluster = inventory.add_cluster("domain-c7", "cluster1", "/dc1/host/cluster1");

        inventory
            .reconfigure(
                &cluster,
                ClusterConfigDelta::RemoveOverride(ManagedRef::vm("vm-404")),
            )
            .await
            .unwrap();
        assert!(inventory.overrides("domain-c7").is_empty());
    }

    #[tokio::test]
    async fn test_lookups_by_path_and_uuid() {
        let inventory = SimInventory::new();
        inventory.add_cluster("domain-c7", "cluster1", "/dc1/host/cluster1");
        let (vm, uuid) = inventory.add_vm("vm-10", "web1", "/dc1/vm/web1");

        let by_path = inventory.cluster_by_path("/dc1/host/cluster1").await.unwrap();
        assert_eq!(by_path.reference, ManagedRef::cluster("domain-c7"));

        let by_uuid = inventory.vm_by_uuid(&uuid).await.unwrap();
        assert_eq!(by_uuid.reference, vm.reference);

        let err = inventory.vm_by_uuid("no-such-uuid").await.unwrap_err();
        assert!(matches!(err, CirrusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_capability_gate() {
        let inventory = SimInventory::without_cluster_api();
        let err = inventory.ensure_cluster_api().await.unwrap_err();
        assert!(matches!(err, CirrusError::UnsupportedEndpoint { .. }));
    }
}
