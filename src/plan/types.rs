//! Declarative resource graph types.
//!
//! This module contains the resource descriptions handed to a provisioning
//! backend: one record per resource with its kind, deterministic logical
//! name, desired properties and the logical names it depends on.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Kinds of resources the synthesizer declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    IpamPool,
    IpamRegionalPool,
    ResourceShare,
    Vpc,
    InternetGateway,
    Subnet,
    RouteTable,
    Route,
    RouteTableAssociation,
    ElasticIp,
    NatGateway,
    TransitGatewayAttachment,
    VpcEndpoint,
    TransitRouteTable,
    TransitRouteTableAssociation,
    TransitRouteTablePropagation,
}

impl ResourceKind {
    /// Identifier prefix a provider typically uses for this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::IpamPool | ResourceKind::IpamRegionalPool => "ipam-pool",
            ResourceKind::ResourceShare => "share",
            ResourceKind::Vpc => "vpc",
            ResourceKind::InternetGateway => "igw",
            ResourceKind::Subnet => "subnet",
            ResourceKind::RouteTable => "rtb",
            ResourceKind::Route => "r",
            ResourceKind::RouteTableAssociation => "rtbassoc",
            ResourceKind::ElasticIp => "eipalloc",
            ResourceKind::NatGateway => "nat",
            ResourceKind::TransitGatewayAttachment => "tgw-attach",
            ResourceKind::VpcEndpoint => "vpce",
            ResourceKind::TransitRouteTable => "tgw-rtb",
            ResourceKind::TransitRouteTableAssociation => "tgw-rtbassoc",
            ResourceKind::TransitRouteTablePropagation => "tgw-rtbprop",
        }
    }
}

/// One declared resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDecl {
    pub kind: ResourceKind,
    /// Deterministic logical name, unique within a plan
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceDecl {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn tags(self, tags: &BTreeMap<String, String>, name: &str) -> Self {
        let mut tags = tags.clone();
        tags.insert("Name".to_string(), name.to_string());
        let value: serde_json::Map<String, Value> =
            tags.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self.property("tags", Value::Object(value))
    }

    /// String property, if present
    pub fn string(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// The full declared graph written to `plan.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeclaredPlan {
    pub resources: Vec<ResourceDecl>,
}

impl DeclaredPlan {
    pub fn extend(&mut self, resources: impl IntoIterator<Item = ResourceDecl>) {
        self.resources.extend(resources);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources.iter().filter(|r| r.kind == kind).count()
    }

    /// Names that are duplicated or referenced before being declared
    pub fn ordering_violations(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut violations = Vec::new();
        for resource in &self.resources {
            for dep in &resource.depends_on {
                if !seen.contains(dep.as_str()) {
                    violations.push(format!("{} depends on undeclared {}", resource.name, dep));
                }
            }
            if !seen.insert(resource.name.as_str()) {
                violations.push(format!("{} declared twice", resource.name));
            }
        }
        violations
    }
}

/// Summary of resource counts per kind, for logging
pub fn kind_counts(resources: &[ResourceDecl]) -> BTreeMap<ResourceKind, usize> {
    let mut counts = BTreeMap::new();
    for resource in resources {
        *counts.entry(resource.kind).or_insert(0) += 1;
    }
    counts
}
