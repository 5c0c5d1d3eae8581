//! Topology type definitions.
//!
//! Subnet roles, NAT strategies, route-domain keys and the planned
//! gateway/route-domain records that make up a network plan.

use crate::ip::allocator::SubnetKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical role of a subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    /// Routed to the internet gateway
    Public,
    /// Egress through NAT, if any
    Private,
    /// Reserved for external interconnect attachments
    Transit,
}

impl SubnetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetType::Public => "public",
            SubnetType::Private => "private",
            SubnetType::Transit => "transit",
        }
    }
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NAT gateway placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatStrategy {
    /// One NAT gateway per availability zone
    #[default]
    Zonal,
    /// One NAT gateway shared by the whole network
    Regional,
}

/// Identity of a route domain (route table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RouteDomainKey {
    /// One domain for every subnet of a type
    Shared { subnet_type: SubnetType },
    /// One domain per availability zone for a type
    PerZone { subnet_type: SubnetType, az_index: usize },
}

impl RouteDomainKey {
    pub fn subnet_type(&self) -> SubnetType {
        match self {
            RouteDomainKey::Shared { subnet_type } | RouteDomainKey::PerZone { subnet_type, .. } => *subnet_type,
        }
    }

    pub fn az_index(&self) -> Option<usize> {
        match self {
            RouteDomainKey::Shared { .. } => None,
            RouteDomainKey::PerZone { az_index, .. } => Some(*az_index),
        }
    }
}

impl fmt::Display for RouteDomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDomainKey::Shared { subnet_type } => write!(f, "{}", subnet_type),
            RouteDomainKey::PerZone { subnet_type, az_index } => write!(f, "{}-{}", subnet_type, az_index),
        }
    }
}

/// Target of a default route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteTarget {
    InternetGateway,
    /// Index into the network's NAT gateway list
    NatGateway { index: usize },
}

/// A planned route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDomainPlan {
    pub key: RouteDomainKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_route: Option<RouteTarget>,
    pub associations: Vec<SubnetKey>,
}

/// A planned NAT gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatGatewayPlan {
    /// Zone served, `None` under the regional strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub az_index: Option<usize>,
    /// Public subnet the gateway lives in
    pub anchor: SubnetKey,
}

/// A planned attachment to an external interconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentPlan {
    pub interconnect: String,
    pub subnet_type: SubnetType,
    pub subnets: Vec<SubnetKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_group: Option<String>,
}

/// First-party services reachable through gateway endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointService {
    S3,
    Dynamodb,
}

impl EndpointService {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointService::S3 => "s3",
            EndpointService::Dynamodb => "dynamodb",
        }
    }

    /// Provider service name in a region
    pub fn service_name(&self, region: &str) -> String {
        format!("com.amazonaws.{}.{}", region, self.as_str())
    }
}

/// A planned gateway endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointPlan {
    pub service: EndpointService,
    pub service_name: String,
    pub route_domains: Vec<RouteDomainKey>,
}
