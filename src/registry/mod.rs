//! # Topology Registry Module
//!
//! This module builds the handles that downstream collaborators (compute,
//! storage and DNS components) consume once a plan has been applied.
//! Handles carry backend identifiers, not logical names, so collaborators
//! never need to know how resources were named.
//!
//! ## Handle Types
//!
//! **Network handle**:
//! - Network id and realized parent block
//! - Subnet ids by type, and by (spec name, AZ index)
//! - Route domain ids, internet gateway id, NAT gateway ids
//! - External attachment id and routing group, when attached
//!
//! **Pool handle**:
//! - Pool id, regional pool ids per operating region
//! - Organization share id, when shared
//!
//! **Segmentation handle**:
//! - Transit route table id per routing group (hub included)
//! - Group binding of every attached network
//!
//! ## Output
//!
//! The registry is written as `topology.json`:
//!
//! ```json
//! {
//!   "generated_at": "2024-05-01T12:00:00Z",
//!   "networks": [
//!     {
//!       "name": "prod",
//!       "id": "vpc-acme-prod-vpc",
//!       "parent_block": "10.0.0.0/16",
//!       "subnets": [
//!         { "name": "public", "az_index": 0, "zone": "us-east-1a", "id": "subnet-acme-prod-subnet-public-0" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::SynthError;
use crate::ip::pool::AddressPool;
use crate::plan::apply::RealizedResources;
use crate::plan::naming::{self, NetworkNames, PoolNames};
use crate::topology::builder::NetworkPlan;
use crate::topology::routing_groups::GroupAttachment;
use crate::topology::types::SubnetType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One realized subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetHandle {
    pub name: String,
    pub az_index: usize,
    pub zone: String,
    pub subnet_type: SubnetType,
    pub cidr_block: String,
    pub id: String,
}

/// What collaborators get for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkHandle {
    pub name: String,
    pub region: String,
    pub id: String,
    pub parent_block: String,
    pub subnets: Vec<SubnetHandle>,
    /// Route domain key (`public`, `private-0`, ...) to route table id
    pub route_domain_ids: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_gateway_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nat_gateway_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_attachment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_group: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_ids: BTreeMap<String, String>,
}

impl NetworkHandle {
    /// Look up the realized identifiers of every resource in a network plan
    pub fn resolve(plan: &NetworkPlan, realized: &RealizedResources) -> Result<Self, SynthError> {
        let names = NetworkNames::new(&plan.resource_prefix);
        let vpc = names.vpc();

        // Pool-backed blocks are whatever the backend actually assigned.
        let parent_block = realized
            .attribute(&vpc, "cidr_block")
            .map(str::to_string)
            .unwrap_or_else(|| plan.parent.block.to_string());

        let subnets = plan
            .layout
            .subnets
            .iter()
            .map(|subnet| -> Result<SubnetHandle, SynthError> {
                let name = names.subnet(&subnet.key);
                Ok(SubnetHandle {
                    name: subnet.key.name.clone(),
                    az_index: subnet.key.az_index,
                    zone: plan.zone(subnet.key.az_index).unwrap_or_default().to_string(),
                    subnet_type: subnet.subnet_type,
                    cidr_block: realized
                        .attribute(&name, "cidr_block")
                        .map(str::to_string)
                        .unwrap_or_else(|| subnet.block.to_string()),
                    id: realized.id(&name)?.to_string(),
                })
            })
            .collect::<Result<Vec<_>, SynthError>>()?;

        let route_domain_ids = plan
            .route_domains
            .iter()
            .map(|domain| {
                let id = realized.id(&names.route_table(&domain.key))?;
                Ok::<_, SynthError>((domain.key.to_string(), id.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, SynthError>>()?;

        let internet_gateway_id = if plan.internet_gateway {
            Some(realized.id(&names.internet_gateway())?.to_string())
        } else {
            None
        };

        let nat_gateway_ids = plan
            .nat_gateways
            .iter()
            .map(|nat| realized.id(&names.nat_gateway(nat)).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let external_attachment_id = match &plan.attachment {
            Some(_) => Some(realized.id(&names.attachment())?.to_string()),
            None => None,
        };

        let endpoint_ids = plan
            .endpoints
            .iter()
            .map(|e| {
                let id = realized.id(&names.endpoint(e.service))?;
                Ok::<_, SynthError>((e.service.as_str().to_string(), id.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, SynthError>>()?;

        Ok(Self {
            name: plan.name.clone(),
            region: plan.region.clone(),
            id: realized.id(&vpc)?.to_string(),
            parent_block,
            subnets,
            route_domain_ids,
            internet_gateway_id,
            nat_gateway_ids,
            external_attachment_id,
            routing_group: plan.attachment.as_ref().and_then(|a| a.routing_group.clone()),
            endpoint_ids,
        })
    }

    /// Subnet ids of one type in allocation order
    pub fn subnet_ids_by_type(&self, subnet_type: SubnetType) -> Vec<&str> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Subnet id for a (spec name, AZ index) pair
    pub fn subnet_id(&self, name: &str, az_index: usize) -> Result<&str, SynthError> {
        self.subnets
            .iter()
            .find(|s| s.name == name && s.az_index == az_index)
            .map(|s| s.id.as_str())
            .ok_or_else(|| SynthError::not_found("subnet", format!("{}/{}-{}", self.name, name, az_index)))
    }

    pub fn route_domain_ids(&self) -> Vec<&str> {
        self.route_domain_ids.values().map(String::as_str).collect()
    }
}

/// What collaborators get for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolHandle {
    pub name: String,
    pub id: String,
    pub blocks: Vec<String>,
    /// Operating region to regional pool id
    pub regional_pool_ids: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
}

impl PoolHandle {
    pub fn resolve(pool: &AddressPool, name_prefix: &str, realized: &RealizedResources) -> Result<Self, SynthError> {
        let names = PoolNames::new(name_prefix, &pool.name);
        let regional_pool_ids = pool
            .regional_handles()
            .map(|h| {
                let id = realized.id(&names.regional(&h.region))?;
                Ok::<_, SynthError>((h.region.clone(), id.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, SynthError>>()?;

        Ok(Self {
            name: pool.name.clone(),
            id: realized.id(&names.pool())?.to_string(),
            blocks: pool.blocks.iter().map(|b| b.to_string()).collect(),
            regional_pool_ids,
            share_id: pool.share_id.clone(),
        })
    }
}

/// Transit hub segmentation as realized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentationHandle {
    pub transit_gateway: String,
    /// Routing group (hub included) to transit route table id
    pub route_table_ids: BTreeMap<String, String>,
    pub attachments: Vec<GroupAttachment>,
}

impl SegmentationHandle {
    pub fn resolve(
        transit_gateway: &str,
        domains: &[String],
        attachments: &[GroupAttachment],
        name_prefix: &str,
        realized: &RealizedResources,
    ) -> Result<Self, SynthError> {
        let route_table_ids = domains
            .iter()
            .map(|d| {
                let id = realized.id(&naming::transit_route_table(name_prefix, d))?;
                Ok::<_, SynthError>((d.clone(), id.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, SynthError>>()?;

        Ok(Self {
            transit_gateway: transit_gateway.to_string(),
            route_table_ids,
            attachments: attachments.to_vec(),
        })
    }
}

/// Everything written to `topology.json`
#[derive(Debug, Clone, Serialize)]
pub struct TopologyRegistry {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<PoolHandle>,
    pub networks: Vec<NetworkHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationHandle>,
}

impl TopologyRegistry {
    pub fn network(&self, name: &str) -> Result<&NetworkHandle, SynthError> {
        self.networks
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| SynthError::not_found("network", name))
    }

    pub fn pool(&self, name: &str) -> Result<&PoolHandle, SynthError> {
        self.pools
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SynthError::not_found("pool", name))
    }
}
