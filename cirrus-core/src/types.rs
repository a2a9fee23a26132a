use serde::{Deserialize, Serialize};

use crate::error::{CirrusError, CirrusResult};

/// Kinds of managed objects this system addresses on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    ClusterComputeResource,
    VirtualMachine,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefKind::ClusterComputeResource => write!(f, "ClusterComputeResource"),
            RefKind::VirtualMachine => write!(f, "VirtualMachine"),
        }
    }
}

/// Transient managed-object reference.
///
/// The `value` half is only stable for the lifetime of the object on the
/// platform; durable identity for VMs comes from their instance UUID
/// (see [`VmProperties`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedRef {
    pub kind: RefKind,
    pub value: String,
}

impl ManagedRef {
    pub fn cluster(value: impl Into<String>) -> Self {
        Self {
            kind: RefKind::ClusterComputeResource,
            value: value.into(),
        }
    }

    pub fn vm(value: impl Into<String>) -> Self {
        Self {
            kind: RefKind::VirtualMachine,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for ManagedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Live handle to a compute cluster, produced by inventory lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub reference: ManagedRef,
    pub name: String,
}

impl ClusterHandle {
    pub fn new(reference: ManagedRef, name: impl Into<String>) -> Self {
        Self {
            reference,
            name: name.into(),
        }
    }
}

/// Live handle to a virtual machine, produced by inventory lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    pub reference: ManagedRef,
    pub name: String,
}

impl VmHandle {
    pub fn new(reference: ManagedRef, name: impl Into<String>) -> Self {
        Self {
            reference,
            name: name.into(),
        }
    }
}

/// DRS automation level for a single virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DrsBehavior {
    #[default]
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "partiallyAutomated")]
    PartiallyAutomated,
    #[serde(rename = "fullyAutomated")]
    FullyAutomated,
}

impl DrsBehavior {
    /// Wire values accepted for the automation level, in schema order.
    pub const ALLOWED_VALUES: [&'static str; 3] =
        ["manual", "partiallyAutomated", "fullyAutomated"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrsBehavior::Manual => "manual",
            DrsBehavior::PartiallyAutomated => "partiallyAutomated",
            DrsBehavior::FullyAutomated => "fullyAutomated",
        }
    }
}

impl std::fmt::Display for DrsBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DrsBehavior {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(DrsBehavior::Manual),
            "partiallyAutomated" => Ok(DrsBehavior::PartiallyAutomated),
            "fullyAutomated" => Ok(DrsBehavior::FullyAutomated),
            other => Err(CirrusError::InvalidInput {
                field: "drs_automation_level".to_string(),
                message: format!(
                    "unknown value {:?}, expected one of {:?}",
                    other,
                    Self::ALLOWED_VALUES
                ),
            }),
        }
    }
}

/// One per-VM DRS override entry in a cluster's configuration, keyed by the
/// VM's managed reference. At most one entry exists per VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsVmOverride {
    pub key: ManagedRef,
    pub enabled: bool,
    pub behavior: DrsBehavior,
}

/// A single reconfiguration delta submitted against a cluster.
///
/// `UpsertOverride` carries the platform's add-operation semantics for this
/// list type: adding an entry whose key already exists fully replaces the
/// existing entry rather than duplicating or merging it. Callers rely on
/// that replace-on-add behavior for updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterConfigDelta {
    UpsertOverride(DrsVmOverride),
    RemoveOverride(ManagedRef),
}

/// Properties fetched for a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmProperties {
    /// Stable instance UUID, surviving moves and renames.
    pub uuid: String,
    pub name: String,
}

/// Typed DRS portion of a cluster's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfigInfo {
    pub drs_vm_overrides: Vec<DrsVmOverride>,
}

/// The platform reports cluster configuration as a generic extension value;
/// only full compute clusters carry the shape this system understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigPayload {
    Cluster(ClusterConfigInfo),
    Opaque(String),
}

/// Properties fetched for a compute cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProperties {
    pub name: String,
    pub configuration: ConfigPayload,
}

impl ClusterProperties {
    /// Narrow the configuration payload to the cluster shape and return its
    /// override list. Returns a typed error when the payload is some other
    /// extension shape, never panics.
    pub fn drs_overrides(&self) -> CirrusResult<&[DrsVmOverride]> {
        match &self.configuration {
            ConfigPayload::Cluster(info) => Ok(&info.drs_vm_overrides),
            ConfigPayload::Opaque(kind) => Err(CirrusError::UnexpectedPayload {
                expected: "cluster configuration".to_string(),
                actual: kind.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_drs_behavior_round_trip() {
        for value in DrsBehavior::ALLOWED_VALUES {
            let parsed = DrsBehavior::from_str(value).unwrap();
            assert_eq!(parsed.to_string(), value);
        }
    }

    #[test]
    fn test_drs_behavior_rejects_unknown_value() {
        let err = DrsBehavior::from_str("turbo").unwrap_err();
        assert!(matches!(
            err,
            CirrusError::InvalidInput { ref field, .. } if field == "drs_automation_level"
        ));
    }

    #[test]
    fn test_drs_behavior_default_is_manual() {
        assert_eq!(DrsBehavior::default(), DrsBehavior::Manual);
    }

    #[test]
    fn test_cluster_properties_narrows_payload() {
        let props = ClusterProperties {
            name: "compute-cluster1".to_string(),
            configuration: ConfigPayload::Cluster(ClusterConfigInfo {
                drs_vm_overrides: vec![DrsVmOverride {
                    key: ManagedRef::vm("vm-42"),
                    enabled: true,
                    behavior: DrsBehavior::FullyAutomated,
                }],
            }),
        };
        let overrides = props.drs_overrides().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].key, ManagedRef::vm("vm-42"));
    }

    #[test]
    fn test_cluster_properties_rejects_opaque_payload() {
        let props = ClusterProperties {
            name: "standalone-host".to_string(),
            configuration: ConfigPayload::Opaque("HostConfigInfo".to_string()),
        };
        let err = props.drs_overrides().unwrap_err();
        assert!(matches!(err, CirrusError::UnexpectedPayload { .. }));
    }
}
