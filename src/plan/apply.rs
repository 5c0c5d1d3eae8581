//! Plan application.
//!
//! Walks a declared plan in order and hands each resource to a
//! provisioning backend. A resource is only provisioned once everything it
//! depends on has been realized.

use crate::backend::{ProvisionedResource, ProvisioningBackend};
use crate::error::SynthError;
use crate::plan::types::DeclaredPlan;
use serde::Serialize;
use std::collections::BTreeMap;

/// Identifiers and attributes returned by the backend, keyed by logical name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RealizedResources {
    resources: BTreeMap<String, ProvisionedResource>,
}

impl RealizedResources {
    pub fn get(&self, name: &str) -> Option<&ProvisionedResource> {
        self.resources.get(name)
    }

    /// Backend identifier of a realized resource
    pub fn id(&self, name: &str) -> Result<&str, SynthError> {
        self.resources
            .get(name)
            .map(|r| r.id.as_str())
            .ok_or_else(|| SynthError::not_found("realized resource", name))
    }

    pub fn attribute(&self, name: &str, key: &str) -> Option<&str> {
        self.resources
            .get(name)
            .and_then(|r| r.attributes.get(key))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Provision every declared resource in declaration order.
///
/// # Returns
/// * `Err(SynthError::Configuration)` if a resource depends on something
///   that has not been realized yet, or if a name is declared twice
pub fn apply(plan: &DeclaredPlan, backend: &mut dyn ProvisioningBackend) -> Result<RealizedResources, SynthError> {
    let mut realized = RealizedResources::default();

    for resource in &plan.resources {
        if realized.resources.contains_key(&resource.name) {
            return Err(SynthError::configuration(
                format!("resource {}", resource.name),
                "declared more than once",
            ));
        }
        if let Some(missing) = resource.depends_on.iter().find(|dep| !realized.resources.contains_key(*dep)) {
            return Err(SynthError::configuration(
                format!("resource {}", resource.name),
                format!("dependency {} has not been realized", missing),
            ));
        }

        let result = backend.provision(resource)?;
        realized.resources.insert(resource.name.clone(), result);
    }

    log::info!("Applied {} resource(s)", realized.len());
    Ok(realized)
}
