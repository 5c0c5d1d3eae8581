//! Deterministic logical resource names.
//!
//! Network resources are named `{prefix}-{network}-{role}[-{az}]`. Pool and
//! segmentation resources are named `{prefix}-{pool}-{role}` and
//! `{prefix}-{role}-{group}`. An empty prefix is dropped.

use crate::ip::allocator::SubnetKey;
use crate::topology::types::{EndpointService, NatGatewayPlan, RouteDomainKey};

/// Join non-empty name segments with `-`
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

/// Names of the resources declared for one pool
#[derive(Debug, Clone)]
pub struct PoolNames {
    base: String,
}

impl PoolNames {
    pub fn new(name_prefix: &str, pool: &str) -> Self {
        Self {
            base: join(&[name_prefix, pool]),
        }
    }

    pub fn pool(&self) -> String {
        format!("{}-pool", self.base)
    }

    pub fn regional(&self, region: &str) -> String {
        format!("{}-pool-{}", self.base, region)
    }

    pub fn share(&self) -> String {
        format!("{}-share", self.base)
    }
}

/// Names of the resources declared for one network
#[derive(Debug, Clone)]
pub struct NetworkNames {
    base: String,
}

impl NetworkNames {
    /// `resource_prefix` is `{prefix}-{network}` (or just the network name)
    pub fn new(resource_prefix: &str) -> Self {
        Self {
            base: resource_prefix.to_string(),
        }
    }

    pub fn vpc(&self) -> String {
        format!("{}-vpc", self.base)
    }

    pub fn internet_gateway(&self) -> String {
        format!("{}-igw", self.base)
    }

    pub fn subnet(&self, key: &SubnetKey) -> String {
        format!("{}-subnet-{}", self.base, key)
    }

    pub fn route_table(&self, key: &RouteDomainKey) -> String {
        format!("{}-rt-{}", self.base, key)
    }

    pub fn default_route(&self, key: &RouteDomainKey) -> String {
        format!("{}-rt-{}-default", self.base, key)
    }

    pub fn association(&self, key: &SubnetKey) -> String {
        format!("{}-rta-{}", self.base, key)
    }

    pub fn elastic_ip(&self, nat: &NatGatewayPlan) -> String {
        match nat.az_index {
            Some(az) => format!("{}-nat-eip-{}", self.base, az),
            None => format!("{}-nat-eip", self.base),
        }
    }

    pub fn nat_gateway(&self, nat: &NatGatewayPlan) -> String {
        match nat.az_index {
            Some(az) => format!("{}-nat-{}", self.base, az),
            None => format!("{}-nat", self.base),
        }
    }

    pub fn attachment(&self) -> String {
        format!("{}-tgw-attachment", self.base)
    }

    pub fn endpoint(&self, service: EndpointService) -> String {
        format!("{}-vpce-{}", self.base, service.as_str())
    }
}

/// Transit route table of a routing group
pub fn transit_route_table(name_prefix: &str, group: &str) -> String {
    join(&[name_prefix, "tgw-rt", group])
}

pub fn transit_association(attachment: &str) -> String {
    format!("{}-assoc", attachment)
}

pub fn transit_propagation(attachment: &str, group: &str) -> String {
    format!("{}-prop-{}", attachment, group)
}
