//! Synthesis configuration.
//!
//! YAML-facing types for pools, networks and segmentation, with serde
//! defaults and the structural checks that need no pool or zone state.

use crate::error::SynthError;
use crate::ip::allocator::SubnetRequest;
use crate::ip::block::AddressBlock;
use crate::ip::pool::PoolSpec;
use crate::topology::types::{EndpointService, NatStrategy};
use crate::utils::validation::{
    validate_az_count, validate_name, validate_prefix_range, validate_region, NETWORK_PREFIX_RANGE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Top-level synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Static zone directory, region -> ordered zone names
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub zones: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<PoolSpec>,
    pub networks: Vec<NetworkConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationConfig>,
}

impl Config {
    /// Structural validation that needs no pool or zone state
    pub fn validate(&self) -> Result<(), SynthError> {
        if let Some(prefix) = &self.general.name_prefix {
            validate_name("general.name_prefix", prefix)?;
        }

        for region in self.zones.keys() {
            validate_region("zones", region)?;
        }

        if self.networks.is_empty() {
            return Err(SynthError::validation("networks", "[]", "at least one network is required"));
        }

        let mut names = HashSet::new();
        for network in &self.networks {
            network.validate()?;
            if !names.insert(network.name.as_str()) {
                return Err(SynthError::validation("networks.name", &network.name, "duplicate network name"));
            }
        }

        for network in &self.networks {
            let Some(attachment) = &network.transit_gateway else {
                continue;
            };
            let Some(group) = &attachment.routing_group else {
                continue;
            };
            let segmentation = self.segmentation.as_ref().ok_or_else(|| SynthError::not_found("routing group", group))?;
            if segmentation.transit_gateway != attachment.id {
                return Err(SynthError::configuration(
                    format!("networks[{}].transit_gateway", network.name),
                    format!(
                        "routing group '{}' lives on {} but the network attaches to {}",
                        group, segmentation.transit_gateway, attachment.id
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Resource name prefix, empty when unset
    pub fn name_prefix(&self) -> &str {
        self.general.name_prefix.as_deref().unwrap_or("")
    }
}

/// Shared general configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Tags applied to every declared resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Pool-backed parent block request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolReference {
    pub pool: String,
    pub netmask_length: u8,
}

/// One network (VPC) to synthesize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam_pool: Option<PoolReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_cidr: Option<String>,
    pub availability_zones: usize,
    pub subnets: Vec<SubnetRequest>,
    #[serde(default = "default_true")]
    pub internet_gateway: bool,
    #[serde(default)]
    pub nat_gateway: NatGatewayConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_gateway: Option<TransitAttachmentConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateway_endpoints: Vec<EndpointService>,
    #[serde(default = "default_true")]
    pub enable_dns_hostnames: bool,
    #[serde(default = "default_true")]
    pub enable_dns_support: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Where a network's parent block comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ParentSource {
    Pool { pool: String, netmask_length: u8 },
    Manual(AddressBlock),
    Base(AddressBlock),
}

impl ParentSource {
    /// Prefix length the parent block will have
    pub fn prefix_len(&self) -> u8 {
        match self {
            ParentSource::Pool { netmask_length, .. } => *netmask_length,
            ParentSource::Manual(block) | ParentSource::Base(block) => block.prefix_len(),
        }
    }
}

impl NetworkConfig {
    fn field(&self, name: &str) -> String {
        format!("networks[{}].{}", self.name, name)
    }

    /// Interpret the exclusive parent-block choice
    pub fn parent_source(&self) -> Result<ParentSource, SynthError> {
        let set: Vec<&str> = [
            self.ipam_pool.as_ref().map(|_| "ipam_pool"),
            self.cidr_block.as_ref().map(|_| "cidr_block"),
            self.base_cidr.as_ref().map(|_| "base_cidr"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if set.len() != 1 {
            return Err(SynthError::validation(
                self.field("ipam_pool|cidr_block|base_cidr"),
                if set.is_empty() { "none".to_string() } else { set.join(", ") },
                "exactly one of ipam_pool, cidr_block or base_cidr must be set",
            ));
        }

        if let Some(reference) = &self.ipam_pool {
            validate_prefix_range(
                &self.field("ipam_pool.netmask_length"),
                reference.netmask_length,
                NETWORK_PREFIX_RANGE,
            )?;
            return Ok(ParentSource::Pool {
                pool: reference.pool.clone(),
                netmask_length: reference.netmask_length,
            });
        }

        if let Some(text) = &self.cidr_block {
            let field = self.field("cidr_block");
            let block = AddressBlock::parse(text).map_err(|e| SynthError::from_cidr(&field, text, e))?;
            validate_prefix_range(&field, block.prefix_len(), NETWORK_PREFIX_RANGE)?;
            return Ok(ParentSource::Manual(block));
        }

        let text = self.base_cidr.as_deref().unwrap_or_default();
        let field = self.field("base_cidr");
        let block = AddressBlock::parse(text).map_err(|e| SynthError::from_cidr(&field, text, e))?;
        Ok(ParentSource::Base(block))
    }

    /// Field-level validation of one network
    pub fn validate(&self) -> Result<(), SynthError> {
        validate_name("networks.name", &self.name)?;
        validate_region(&self.field("region"), &self.region)?;
        validate_az_count(&self.field("availability_zones"), self.availability_zones)?;
        self.parent_source()?;

        if self.subnets.is_empty() {
            return Err(SynthError::validation(self.field("subnets"), "[]", "at least one subnet is required"));
        }

        if let Some(attachment) = &self.transit_gateway {
            if attachment.id.trim().is_empty() {
                return Err(SynthError::validation(self.field("transit_gateway.id"), "", "must not be empty"));
            }
        }

        let mut services = HashSet::new();
        for service in &self.gateway_endpoints {
            if !services.insert(service) {
                return Err(SynthError::validation(
                    self.field("gateway_endpoints"),
                    service.as_str(),
                    "duplicate endpoint service",
                ));
            }
        }

        Ok(())
    }
}

/// NAT gateway toggles
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NatGatewayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub strategy: NatStrategy,
}

/// Attachment to an external interconnect (transit hub)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitAttachmentConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_group: Option<String>,
}

/// Routing-group segmentation on a shared transit hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentationConfig {
    pub transit_gateway: String,
    #[serde(default)]
    pub groups: BTreeMap<String, RoutingGroupConfig>,
}

/// One routing group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoutingGroupConfig {
    #[serde(default)]
    pub allowed_groups: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
general:
  name_prefix: acme
  tags:
    CreatedBy: vpcsynth
networks:
  - name: prod
    region: us-east-1
    cidr_block: "10.0.0.0/16"
    availability_zones: 2
    nat_gateway:
      enabled: true
    subnets:
      - name: public
        type: public
        subnet_prefix: 24
      - name: private
        type: private
        subnet_prefix: 24
"#;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_config_parsing_and_defaults() {
        let config = parse(BASE);
        assert!(config.validate().is_ok());
        assert_eq!(config.name_prefix(), "acme");

        let network = &config.networks[0];
        assert!(network.internet_gateway);
        assert!(network.enable_dns_hostnames);
        assert!(network.nat_gateway.enabled);
        assert_eq!(network.nat_gateway.strategy, NatStrategy::Zonal);
        assert_eq!(
            network.parent_source().unwrap(),
            ParentSource::Manual(AddressBlock::parse("10.0.0.0/16").unwrap())
        );
    }

    #[test]
    fn test_exclusive_parent_source() {
        let mut config = parse(BASE);
        config.networks[0].base_cidr = Some("10.1.0.0/16".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("cidr_block, base_cidr"));

        config.networks[0].cidr_block = None;
        config.networks[0].base_cidr = None;
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'none'"));
    }

    #[test]
    fn test_pool_source_and_ranges() {
        let mut config = parse(BASE);
        config.networks[0].cidr_block = None;
        config.networks[0].ipam_pool = Some(PoolReference {
            pool: "core".to_string(),
            netmask_length: 20,
        });
        assert_eq!(
            config.networks[0].parent_source().unwrap(),
            ParentSource::Pool {
                pool: "core".to_string(),
                netmask_length: 20
            }
        );

        config.networks[0].ipam_pool.as_mut().unwrap().netmask_length = 12;
        assert!(config.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_manual_and_base_cidr_ranges() {
        let mut config = parse(BASE);
        config.networks[0].cidr_block = Some("10.0.0.0/12".to_string());
        assert!(config.validate().unwrap_err().is_validation());

        // Base blocks are used verbatim, only format and alignment are checked.
        config.networks[0].cidr_block = None;
        config.networks[0].base_cidr = Some("10.0.0.0/12".to_string());
        assert!(config.validate().is_ok());

        config.networks[0].base_cidr = Some("10.0.0.1/12".to_string());
        assert!(config.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_network_field_validation() {
        let mut config = parse(BASE);
        config.networks[0].availability_zones = 7;
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = parse(BASE);
        config.networks[0].subnets.clear();
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = parse(BASE);
        config.networks[0].region = "us-east".to_string();
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = parse(BASE);
        let copy = config.networks[0].clone();
        config.networks.push(copy);
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = parse(BASE);
        config.networks[0].gateway_endpoints = vec![EndpointService::S3, EndpointService::S3];
        assert!(config.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_routing_group_requires_segmentation() {
        let mut config = parse(BASE);
        config.networks[0].transit_gateway = Some(TransitAttachmentConfig {
            id: "tgw-shared".to_string(),
            routing_group: Some("production".to_string()),
        });
        assert!(config.validate().unwrap_err().is_not_found());

        config.segmentation = Some(SegmentationConfig {
            transit_gateway: "tgw-other".to_string(),
            groups: BTreeMap::new(),
        });
        assert!(config.validate().unwrap_err().is_configuration());

        config.segmentation.as_mut().unwrap().transit_gateway = "tgw-shared".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_endpoint_service_rejected() {
        let yaml = BASE.replace("    nat_gateway:", "    gateway_endpoints: [sqs]\n    nat_gateway:");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }
}
