use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use cirrus_core::{
    CirrusError, CirrusResult, ClusterConfigDelta, ClusterHandle, ClusterInventory, DrsBehavior,
    DrsVmOverride, VmHandle,
};

use crate::identity;
use crate::state::OverrideState;

/// Reconciles one per-VM DRS override against a cluster's configuration.
///
/// Every operation runs the same sequential pipeline: resolve the cluster
/// and VM handles, then either submit one configuration delta or translate
/// fetched remote state back into the schema fields. The inventory handle is
/// an injected dependency; the controller holds no other state and performs
/// no retries, so concurrent writers against the same (cluster, VM) pair get
/// last-write-wins semantics from the platform's replace-on-add behavior.
pub struct OverrideResource {
    inventory: Arc<dyn ClusterInventory>,
}

impl OverrideResource {
    pub fn new(inventory: Arc<dyn ClusterInventory>) -> Self {
        Self { inventory }
    }

    /// Create the override entry and store its composite identifier, then
    /// refresh the state from the platform.
    pub async fn create(&self, state: &mut OverrideState) -> CirrusResult<()> {
        debug!("{}: beginning create", state.id_string());

        state.validate()?;
        let (cluster, vm) = self.objects(state).await?;

        let info = expand_override(state, &vm)?;
        self.inventory
            .reconfigure(&cluster, ClusterConfigDelta::UpsertOverride(info))
            .await?;

        let id = self.composite_id(&cluster, &vm).await.map_err(|err| {
            CirrusError::Internal {
                message: format!("cannot compute ID of created resource: {}", err),
            }
        })?;
        state.id = Some(id);

        debug!("{}: create finished successfully", state.id_string());
        self.read(state).await
    }

    /// Refresh local state from the platform.
    ///
    /// When no matching entry exists anymore the identifier is cleared and
    /// the call still succeeds, so the resource can be re-created on the
    /// next apply instead of erroring on out-of-band deletion.
    pub async fn read(&self, state: &mut OverrideState) -> CirrusResult<()> {
        debug!("{}: beginning read", state.id_string());

        let (cluster, vm) = self.objects(state).await?;

        let Some(info) = self.find_override(&cluster, &vm).await? else {
            state.id = None;
            return Ok(());
        };

        // Re-derive both identifier attributes. They are immutable, but on
        // import this corrects a technically-valid, non-canonical path.
        state.compute_cluster_id = cluster.reference.value.clone();
        let props = self.inventory.vm_properties(&vm).await.map_err(|err| {
            CirrusError::Internal {
                message: format!("error getting properties of virtual machine: {}", err),
            }
        })?;
        state.virtual_machine_id = props.uuid;

        flatten_override(state, &info);

        debug!("{}: read completed successfully", state.id_string());
        Ok(())
    }

    /// Replace the entry with one expanded from current local state.
    ///
    /// The platform's add operation on this list type overwrites the
    /// existing same-key entry wholesale, so this is a full replace built
    /// from local state, never a field-by-field merge with remote values.
    pub async fn update(&self, state: &mut OverrideState) -> CirrusResult<()> {
        debug!("{}: beginning update", state.id_string());

        state.validate()?;
        let (cluster, vm) = self.objects(state).await?;

        let info = expand_override(state, &vm)?;
        self.inventory
            .reconfigure(&cluster, ClusterConfigDelta::UpsertOverride(info))
            .await?;

        debug!("{}: update finished successfully", state.id_string());
        self.read(state).await
    }

    /// Remove the entry, addressed by the VM's reference. The platform
    /// accepts removal of an already-absent key; no local retry.
    pub async fn delete(&self, state: &mut OverrideState) -> CirrusResult<()> {
        debug!("{}: beginning delete", state.id_string());

        let (cluster, vm) = self.objects(state).await?;

        self.inventory
            .reconfigure(&cluster, ClusterConfigDelta::RemoveOverride(vm.reference))
            .await?;

        state.id = None;
        debug!("deleted successfully");
        Ok(())
    }

    /// Resolve an import document into state carrying the composite
    /// identifier used by all other operations.
    ///
    /// The input is a JSON object with required string keys
    /// `compute_cluster_path` and `virtual_machine_path`; other keys are
    /// ignored. The returned state holds only the identifier, a subsequent
    /// read fills in the attributes.
    pub async fn import(&self, input: &str) -> CirrusResult<OverrideState> {
        let data: HashMap<String, String> = serde_json::from_str(input)?;
        let cluster_path =
            data.get("compute_cluster_path")
                .ok_or_else(|| CirrusError::InvalidInput {
                    field: "compute_cluster_path".to_string(),
                    message: "missing compute_cluster_path in input data".to_string(),
                })?;
        let vm_path =
            data.get("virtual_machine_path")
                .ok_or_else(|| CirrusError::InvalidInput {
                    field: "virtual_machine_path".to_string(),
                    message: "missing virtual_machine_path in input data".to_string(),
                })?;

        self.inventory.ensure_cluster_api().await?;

        let cluster = self
            .inventory
            .cluster_by_path(cluster_path)
            .await
            .map_err(|err| locate_context(err, &format!("cannot locate cluster {:?}", cluster_path)))?;
        let vm = self
            .inventory
            .vm_by_path(vm_path)
            .await
            .map_err(|err| {
                locate_context(err, &format!("cannot locate virtual machine {:?}", vm_path))
            })?;

        let id = self.composite_id(&cluster, &vm).await.map_err(|err| {
            CirrusError::Internal {
                message: format!("cannot compute ID of imported resource: {}", err),
            }
        })?;

        Ok(OverrideState::imported(id))
    }

    /// Locate the override entry for a VM, or report that none exists.
    ///
    /// Absence is an explicit `None`, never conflated with a lookup error.
    /// Linear scan over the full fetched list; there is at most one entry
    /// per VM, bounded by cluster size.
    pub async fn find_override(
        &self,
        cluster: &ClusterHandle,
        vm: &VmHandle,
    ) -> CirrusResult<Option<DrsVmOverride>> {
        let props = self
            .inventory
            .cluster_properties(cluster)
            .await
            .map_err(|err| CirrusError::ClusterOperationFailed {
                operation: "fetch properties".to_string(),
                details: err.to_string(),
            })?;

        for entry in props.drs_overrides()? {
            if entry.key == vm.reference {
                debug!(
                    "Found DRS override for VM '{}' in cluster '{}'",
                    vm.name, cluster.name
                );
                return Ok(Some(entry.clone()));
            }
        }

        debug!(
            "No DRS override found for VM '{}' in cluster '{}'",
            vm.name, cluster.name
        );
        Ok(None)
    }

    /// Resolve the cluster and VM handles for an operation.
    ///
    /// When the state carries a composite identifier the halves come from
    /// parsing it; otherwise from the two attribute fields.
    async fn objects(&self, state: &OverrideState) -> CirrusResult<(ClusterHandle, VmHandle)> {
        match &state.id {
            Some(id) => {
                let (cluster_id, vm_uuid) = identity::parse_id(id)?;
                self.fetch_objects(&cluster_id, &vm_uuid).await
            }
            None => {
                self.fetch_objects(&state.compute_cluster_id, &state.virtual_machine_id)
                    .await
            }
        }
    }

    async fn fetch_objects(
        &self,
        cluster_id: &str,
        vm_uuid: &str,
    ) -> CirrusResult<(ClusterHandle, VmHandle)> {
        self.inventory.ensure_cluster_api().await?;

        let cluster = self
            .inventory
            .cluster_by_id(cluster_id)
            .await
            .map_err(|err| locate_context(err, "cannot locate cluster"))?;
        let vm = self
            .inventory
            .vm_by_uuid(vm_uuid)
            .await
            .map_err(|err| locate_context(err, "cannot locate virtual machine"))?;

        Ok((cluster, vm))
    }

    async fn composite_id(
        &self,
        cluster: &ClusterHandle,
        vm: &VmHandle,
    ) -> CirrusResult<String> {
        let props = self.inventory.vm_properties(vm).await?;
        Ok(identity::flatten_id(&cluster.reference.value, &props.uuid))
    }
}

/// Expand local state into the remote info record, keyed by the VM's own
/// reference. Re-parses the automation level so an invalid value that
/// slipped past upstream validation never reaches the platform.
fn expand_override(state: &OverrideState, vm: &VmHandle) -> CirrusResult<DrsVmOverride> {
    Ok(DrsVmOverride {
        key: vm.reference.clone(),
        enabled: state.drs_enabled,
        behavior: DrsBehavior::from_str(&state.drs_automation_level)?,
    })
}

/// Write a found remote record into the local DRS fields.
fn flatten_override(state: &mut OverrideState, info: &DrsVmOverride) {
    state.drs_enabled = info.enabled;
    state.drs_automation_level = info.behavior.to_string();
}

/// Keep the error taxonomy while naming which lookup failed.
fn locate_context(err: CirrusError, what: &str) -> CirrusError {
    match err {
        CirrusError::NotFound { resource } => CirrusError::NotFound {
            resource: format!("{}: {}", what, resource),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::ManagedRef;

    fn vm_handle() -> VmHandle {
        VmHandle::new(ManagedRef::vm("vm-10"), "web1")
    }

    #[test]
    fn test_expand_uses_vm_reference_as_key() {
        let mut state = OverrideState::new("domain-c7", "u-1");
        state.drs_enabled = true;
        state.drs_automation_level = "fullyAutomated".to_string();

        let info = expand_override(&state, &vm_handle()).unwrap();
        assert_eq!(info.key, ManagedRef::vm("vm-10"));
        assert!(info.enabled);
        assert_eq!(info.behavior, DrsBehavior::FullyAutomated);
    }

    #[test]
    fn test_expand_defends_against_invalid_level() {
        let mut state = OverrideState::new("domain-c7", "u-1");
        state.drs_automation_level = "bogus".to_string();

        let err = expand_override(&state, &vm_handle()).unwrap_err();
        assert!(matches!(err, CirrusError::InvalidInput { .. }));
    }

    #[test]
    fn test_flatten_writes_both_fields() {
        let mut state = OverrideState::new("domain-c7", "u-1");
        let info = DrsVmOverride {
            key: ManagedRef::vm("vm-10"),
            enabled: true,
            behavior: DrsBehavior::PartiallyAutomated,
        };

        flatten_override(&mut state, &info);
        assert!(state.drs_enabled);
        assert_eq!(state.drs_automation_level, "partiallyAutomated");
    }
}
