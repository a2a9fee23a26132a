use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cirrus_core::{CirrusError, CirrusResult, DrsBehavior};

/// Resource kind used in log lines.
pub const RESOURCE_KIND: &str = "drs_vm_override";

/// Schema-shaped state for one per-VM DRS override.
///
/// `compute_cluster_id` and `virtual_machine_id` are immutable after
/// creation: the surrounding configuration framework treats a change to
/// either as destroy-and-recreate, never an in-place move. The two DRS
/// fields are freely mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideState {
    /// Composite identifier, `"<cluster-managed-id>:<vm-uuid>"`. `None`
    /// until created or imported, and cleared again when a read discovers
    /// the remote entry is gone.
    #[serde(default)]
    pub id: Option<String>,
    /// Managed object id of the cluster.
    #[serde(default)]
    pub compute_cluster_id: String,
    /// Stable instance UUID of the virtual machine.
    #[serde(default)]
    pub virtual_machine_id: String,
    /// Enable DRS for this virtual machine.
    #[serde(default)]
    pub drs_enabled: bool,
    /// Automation level for this virtual machine in the cluster. One of
    /// manual, partiallyAutomated, or fullyAutomated.
    #[serde(default = "default_automation_level")]
    pub drs_automation_level: String,
}

fn default_automation_level() -> String {
    DrsBehavior::Manual.to_string()
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            id: None,
            compute_cluster_id: String::new(),
            virtual_machine_id: String::new(),
            drs_enabled: false,
            drs_automation_level: default_automation_level(),
        }
    }
}

impl OverrideState {
    /// State for a resource addressed by two attribute values.
    pub fn new(compute_cluster_id: impl Into<String>, virtual_machine_id: impl Into<String>) -> Self {
        Self {
            compute_cluster_id: compute_cluster_id.into(),
            virtual_machine_id: virtual_machine_id.into(),
            ..Default::default()
        }
    }

    /// State carrying only a freshly computed composite identifier, as
    /// produced by import. A subsequent read fills in the attributes.
    pub fn imported(id: String) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Validate the configured fields the way the schema layer would.
    pub fn validate(&self) -> CirrusResult<()> {
        if self.compute_cluster_id.is_empty() && self.id.is_none() {
            return Err(CirrusError::InvalidConfiguration {
                message: "compute_cluster_id is required".to_string(),
            });
        }
        if self.virtual_machine_id.is_empty() && self.id.is_none() {
            return Err(CirrusError::InvalidConfiguration {
                message: "virtual_machine_id is required".to_string(),
            });
        }
        DrsBehavior::from_str(&self.drs_automation_level)?;
        Ok(())
    }

    /// Friendly identity string for log lines.
    pub fn id_string(&self) -> String {
        match &self.id {
            Some(id) => format!("{} (ID = {})", RESOURCE_KIND, id),
            None => format!("{} (ID = <new resource>)", RESOURCE_KIND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::CirrusError;

    #[test]
    fn test_defaults() {
        let state = OverrideState::new("domain-c7", "u-1");
        assert!(!state.drs_enabled);
        assert_eq!(state.drs_automation_level, "manual");
        assert!(state.id.is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_automation_level() {
        let mut state = OverrideState::new("domain-c7", "u-1");
        state.drs_automation_level = "turbo".to_string();
        let err = state.validate().unwrap_err();
        assert!(matches!(err, CirrusError::InvalidInput { .. }));
    }

    #[test]
    fn test_validate_requires_identifiers_for_new_resources() {
        let state = OverrideState::default();
        let err = state.validate().unwrap_err();
        assert!(matches!(err, CirrusError::InvalidConfiguration { .. }));

        // An imported state carries only the composite id.
        let state = OverrideState::imported("domain-c7:u-1".to_string());
        state.validate().unwrap();
    }

    #[test]
    fn test_id_string() {
        let mut state = OverrideState::new("domain-c7", "u-1");
        assert_eq!(state.id_string(), "drs_vm_override (ID = <new resource>)");
        state.id = Some("domain-c7:u-1".to_string());
        assert_eq!(state.id_string(), "drs_vm_override (ID = domain-c7:u-1)");
    }
}
