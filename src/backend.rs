//! External collaborators.
//!
//! The synthesizer never talks to a cloud provider directly. It consumes a
//! zone directory, an organization-sharing backend and a provisioning
//! backend through the traits below. The dry-run implementations are
//! deterministic stand-ins used by the CLI and the tests.

use crate::error::SynthError;
use crate::plan::types::ResourceDecl;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Ordered availability zones per region
pub trait ZoneDirectory: Send + Sync {
    fn list_available_zones(&self, region: &str) -> Result<Vec<String>, SynthError>;
}

/// Organization-wide resource sharing
pub trait OrganizationSharing {
    fn share_resource(&self, resource_id: &str, scope: &str) -> Result<String, SynthError>;
}

/// What a provisioning backend returns for one declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedResource {
    pub id: String,
    /// Provider-assigned attributes such as a realized `cidr_block`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Realizes declared resources
pub trait ProvisioningBackend {
    fn provision(&mut self, resource: &ResourceDecl) -> Result<ProvisionedResource, SynthError>;
}

/// Zone directory backed by configuration.
///
/// Regions without an explicit list get `{region}a` through `{region}f`.
#[derive(Debug, Clone, Default)]
pub struct StaticZoneDirectory {
    zones: BTreeMap<String, Vec<String>>,
}

impl StaticZoneDirectory {
    pub fn new(zones: BTreeMap<String, Vec<String>>) -> Self {
        Self { zones }
    }
}

impl ZoneDirectory for StaticZoneDirectory {
    fn list_available_zones(&self, region: &str) -> Result<Vec<String>, SynthError> {
        if let Some(zones) = self.zones.get(region) {
            return Ok(zones.clone());
        }
        Ok(["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|suffix| format!("{}{}", region, suffix))
            .collect())
    }
}

/// Sharing backend that records requests and returns `share-{resource}`
#[derive(Debug, Default)]
pub struct DryRunSharing {
    shared: Mutex<Vec<(String, String)>>,
}

impl DryRunSharing {
    /// (resource, scope) pairs shared so far
    pub fn shared(&self) -> Vec<(String, String)> {
        self.shared.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl OrganizationSharing for DryRunSharing {
    fn share_resource(&self, resource_id: &str, scope: &str) -> Result<String, SynthError> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| SynthError::configuration("organization sharing", "share registry lock poisoned"))?;
        shared.push((resource_id.to_string(), scope.to_string()));
        Ok(format!("share-{}", resource_id))
    }
}

/// Provisioning backend that assigns `{kind-prefix}-{logical-name}` identifiers
/// and echoes planned CIDR blocks back as the realized addresses
#[derive(Debug, Default)]
pub struct DryRunBackend {
    provisioned: Vec<(String, ProvisionedResource)>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// (logical name, result) pairs in provisioning order
    pub fn provisioned(&self) -> &[(String, ProvisionedResource)] {
        &self.provisioned
    }
}

impl ProvisioningBackend for DryRunBackend {
    fn provision(&mut self, resource: &ResourceDecl) -> Result<ProvisionedResource, SynthError> {
        let mut attributes = BTreeMap::new();
        if let Some(cidr) = resource.string("cidr_block") {
            attributes.insert("cidr_block".to_string(), cidr.to_string());
        }
        let result = ProvisionedResource {
            id: format!("{}-{}", resource.kind.id_prefix(), resource.name),
            attributes,
        };
        log::debug!("Provisioned {:?} {} as {}", resource.kind, resource.name, result.id);
        self.provisioned.push((resource.name.clone(), result.clone()));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::ResourceKind;

    #[test]
    fn test_static_zone_directory() {
        let mut zones = BTreeMap::new();
        zones.insert("us-east-1".to_string(), vec!["use1-az4".to_string(), "use1-az6".to_string()]);
        let directory = StaticZoneDirectory::new(zones);

        assert_eq!(directory.list_available_zones("us-east-1").unwrap(), vec!["use1-az4", "use1-az6"]);
        let defaults = directory.list_available_zones("eu-west-1").unwrap();
        assert_eq!(defaults.len(), 6);
        assert_eq!(defaults[0], "eu-west-1a");
        assert_eq!(defaults[5], "eu-west-1f");
    }

    #[test]
    fn test_dry_run_backend_is_deterministic() {
        let decl = ResourceDecl::new(ResourceKind::Subnet, "acme-prod-private-0").property("cidr_block", "10.0.2.0/24");

        let mut first = DryRunBackend::new();
        let mut second = DryRunBackend::new();
        let a = first.provision(&decl).unwrap();
        let b = second.provision(&decl).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.id, "subnet-acme-prod-private-0");
        assert_eq!(a.attributes["cidr_block"], "10.0.2.0/24");
        assert_eq!(first.provisioned().len(), 1);
    }
}
