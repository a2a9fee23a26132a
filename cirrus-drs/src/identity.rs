//! Composite identifier codec for override resources.
//!
//! The identifier encodes `"<cluster-managed-id>:<vm-uuid>"`. The VM half is
//! the stable instance UUID so the identifier survives VM moves and renames;
//! the cluster half is the cluster's managed object id.

use cirrus_core::{CirrusError, CirrusResult};

/// Build a composite identifier from its two halves.
pub fn flatten_id(cluster_id: &str, vm_uuid: &str) -> String {
    [cluster_id, vm_uuid].join(":")
}

/// Split a composite identifier into (cluster id, vm uuid).
///
/// A historical format carried a third segment; it is accepted and
/// discarded, only the first two fields are significant.
pub fn parse_id(id: &str) -> CirrusResult<(String, String)> {
    let parts: Vec<&str> = id.splitn(3, ':').collect();
    if parts.len() < 2 {
        return Err(CirrusError::InvalidInput {
            field: "id".to_string(),
            message: format!("bad ID {:?}", id),
        });
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let id = flatten_id("domain-c7", "423f1a8c-0001");
        assert_eq!(id, "domain-c7:423f1a8c-0001");
        let (cluster_id, vm_uuid) = parse_id(&id).unwrap();
        assert_eq!(cluster_id, "domain-c7");
        assert_eq!(vm_uuid, "423f1a8c-0001");
    }

    #[test]
    fn test_parse_id_rejects_single_field() {
        assert!(parse_id("domain-c7").is_err());
        assert!(parse_id("").is_err());
    }

    #[test]
    fn test_parse_id_ignores_legacy_third_segment() {
        let (cluster_id, vm_uuid) = parse_id("domain-c7:423f1a8c-0001:legacy").unwrap();
        assert_eq!(cluster_id, "domain-c7");
        assert_eq!(vm_uuid, "423f1a8c-0001");
    }
}
