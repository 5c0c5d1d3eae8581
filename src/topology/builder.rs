//! Network topology synthesis.
//!
//! Turns one `NetworkConfig` into an immutable `NetworkPlan`: parent block,
//! zones, subnets, route domains, gateways, the optional transit attachment
//! and gateway endpoints. Planning is split in three steps so callers can
//! resolve pool-backed blocks sequentially and plan networks concurrently:
//!
//! 1. `check_network` validates everything that does not need a parent block
//! 2. `resolve_parent` draws the parent block (the only stateful step)
//! 3. `plan_network` is a pure function of its inputs

use crate::backend::ZoneDirectory;
use crate::config::{GeneralConfig, NetworkConfig, ParentSource};
use crate::error::SynthError;
use crate::ip::allocator::{allocate, AllocatedSubnet, SubnetKey, SubnetLayout, SubnetSpec};
use crate::ip::block::AddressBlock;
use crate::ip::pool::AddressPoolManager;
use crate::topology::types::{
    AttachmentPlan, EndpointPlan, NatGatewayPlan, NatStrategy, RouteDomainKey, RouteDomainPlan, RouteTarget,
    SubnetType,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A network whose configuration passed every pre-allocation check
#[derive(Debug, Clone)]
pub struct CheckedNetwork {
    pub config: NetworkConfig,
    pub source: ParentSource,
    pub specs: Vec<SubnetSpec>,
}

/// How the parent block was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParentOrigin {
    Pool {
        pool: String,
        pool_id: String,
        regional_pool_id: String,
        netmask_length: u8,
    },
    Manual,
    Base,
}

/// The parent block of a network and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParent {
    pub block: AddressBlock,
    pub origin: ParentOrigin,
}

/// Immutable plan for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPlan {
    pub name: String,
    /// Prefix of every resource name in this network, e.g. `acme-prod`
    pub resource_prefix: String,
    pub region: String,
    pub parent: ResolvedParent,
    pub zones: Vec<String>,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
    pub layout: SubnetLayout,
    pub internet_gateway: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_strategy: Option<NatStrategy>,
    pub nat_gateways: Vec<NatGatewayPlan>,
    pub route_domains: Vec<RouteDomainPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentPlan>,
    pub endpoints: Vec<EndpointPlan>,
    pub tags: BTreeMap<String, String>,
}

impl NetworkPlan {
    pub fn route_domain(&self, key: &RouteDomainKey) -> Option<&RouteDomainPlan> {
        self.route_domains.iter().find(|d| d.key == *key)
    }

    /// Route domain a subnet is associated with
    pub fn route_domain_of(&self, subnet: &SubnetKey) -> Option<&RouteDomainPlan> {
        self.route_domains.iter().find(|d| d.associations.contains(subnet))
    }

    pub fn subnet(&self, key: &SubnetKey) -> Option<&AllocatedSubnet> {
        self.layout.get(&key.name, key.az_index)
    }

    /// Zone name for an AZ index
    pub fn zone(&self, az_index: usize) -> Option<&str> {
        self.zones.get(az_index).map(String::as_str)
    }
}

/// Validate a network before any address space is drawn for it.
///
/// Covers field validation, subnet spec resolution, NAT prerequisites and
/// transit attachment eligibility. Fails fast with the first problem.
pub fn check_network(config: &NetworkConfig) -> Result<CheckedNetwork, SynthError> {
    config.validate()?;
    let source = config.parent_source()?;

    let specs = config
        .subnets
        .iter()
        .map(|request| SubnetSpec::resolve(request, source.prefix_len(), config.availability_zones))
        .collect::<Result<Vec<_>, _>>()?;

    let mut names = BTreeSet::new();
    for spec in &specs {
        if !names.insert(spec.name.as_str()) {
            return Err(SynthError::validation(
                format!("networks[{}].subnets.name", config.name),
                &spec.name,
                "duplicate subnet name",
            ));
        }
    }

    let context = format!("network {}", config.name);
    let zones_of = |t: SubnetType| -> usize {
        specs
            .iter()
            .filter(|s| s.subnet_type == t)
            .map(|s| s.az_count)
            .max()
            .unwrap_or(0)
    };

    if config.nat_gateway.enabled {
        if zones_of(SubnetType::Public) == 0 {
            return Err(SynthError::configuration(
                &context,
                "NAT gateway requested but no public subnets are declared",
            ));
        }
        if !config.internet_gateway {
            return Err(SynthError::configuration(
                &context,
                "NAT gateway requested but the internet gateway is disabled",
            ));
        }
        if config.nat_gateway.strategy == NatStrategy::Zonal
            && zones_of(SubnetType::Private) > zones_of(SubnetType::Public)
        {
            return Err(SynthError::configuration(
                &context,
                format!(
                    "zonal NAT needs a public subnet in every private zone: private subnets span {} zones, public subnets {}",
                    zones_of(SubnetType::Private),
                    zones_of(SubnetType::Public)
                ),
            ));
        }
    }

    if config.transit_gateway.is_some()
        && zones_of(SubnetType::Transit) == 0
        && zones_of(SubnetType::Private) == 0
    {
        return Err(SynthError::configuration(
            &context,
            "transit attachment requested but no transit or private subnets are declared",
        ));
    }

    Ok(CheckedNetwork {
        config: config.clone(),
        source,
        specs,
    })
}

/// Obtain the parent block for a checked network.
///
/// Pool-backed networks draw from the pool ledger, so this must run
/// sequentially in declaration order for repeatable plans.
pub fn resolve_parent(network: &CheckedNetwork, pools: &mut AddressPoolManager) -> Result<ResolvedParent, SynthError> {
    match &network.source {
        ParentSource::Pool { pool, netmask_length } => {
            let region = &network.config.region;
            let (pool_id, regional_pool_id) = {
                let handle = pools.regional_handle(pool, region)?;
                (pools.pool(pool)?.id.clone(), handle.id.clone())
            };
            let block = pools.allocate(pool, region, *netmask_length, &network.config.name)?;
            Ok(ResolvedParent {
                block,
                origin: ParentOrigin::Pool {
                    pool: pool.clone(),
                    pool_id,
                    regional_pool_id,
                    netmask_length: *netmask_length,
                },
            })
        }
        ParentSource::Manual(block) => Ok(ResolvedParent {
            block: *block,
            origin: ParentOrigin::Manual,
        }),
        ParentSource::Base(block) => Ok(ResolvedParent {
            block: *block,
            origin: ParentOrigin::Base,
        }),
    }
}

/// Plan a checked network on a resolved parent block
pub fn plan_network(
    network: &CheckedNetwork,
    parent: ResolvedParent,
    zones: &dyn ZoneDirectory,
    general: &GeneralConfig,
) -> Result<NetworkPlan, SynthError> {
    let config = &network.config;
    let context = format!("network {}", config.name);

    let available = zones.list_available_zones(&config.region)?;
    if available.len() < config.availability_zones {
        return Err(SynthError::configuration(
            &context,
            format!(
                "{} availability zones requested but region {} only offers {}",
                config.availability_zones,
                config.region,
                available.len()
            ),
        ));
    }
    let zones: Vec<String> = available.into_iter().take(config.availability_zones).collect();

    let layout = allocate(&parent.block, &network.specs)?;

    let nat_strategy = config.nat_gateway.enabled.then_some(config.nat_gateway.strategy);
    let nat_gateways = plan_nat_gateways(&layout, nat_strategy);
    let route_domains = plan_route_domains(&layout, config.internet_gateway, nat_strategy, &nat_gateways, &context)?;

    let attachment = match &config.transit_gateway {
        Some(transit) => Some(plan_attachment(&layout, &transit.id, transit.routing_group.clone(), &context)?),
        None => None,
    };

    let domain_keys: Vec<RouteDomainKey> = route_domains.iter().map(|d| d.key).collect();
    let endpoints = config
        .gateway_endpoints
        .iter()
        .map(|service| EndpointPlan {
            service: *service,
            service_name: service.service_name(&config.region),
            route_domains: domain_keys.clone(),
        })
        .collect();

    let mut tags = general.tags.clone();
    tags.extend(config.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

    let resource_prefix = match general.name_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => format!("{}-{}", prefix, config.name),
        _ => config.name.clone(),
    };

    log::info!(
        "Planned network {} on {}: {} subnet(s), {} route domain(s), {} NAT gateway(s)",
        config.name,
        parent.block,
        layout.subnets.len(),
        route_domains.len(),
        nat_gateways.len()
    );

    Ok(NetworkPlan {
        name: config.name.clone(),
        resource_prefix,
        region: config.region.clone(),
        parent,
        zones,
        enable_dns_hostnames: config.enable_dns_hostnames,
        enable_dns_support: config.enable_dns_support,
        layout,
        internet_gateway: config.internet_gateway,
        nat_strategy,
        nat_gateways,
        route_domains,
        attachment,
        endpoints,
        tags,
    })
}

/// Check, resolve and plan one network in a single call
pub fn build(
    config: &NetworkConfig,
    pools: &mut AddressPoolManager,
    zones: &dyn ZoneDirectory,
    general: &GeneralConfig,
) -> Result<NetworkPlan, SynthError> {
    let checked = check_network(config)?;
    let parent = resolve_parent(&checked, pools)?;
    plan_network(&checked, parent, zones, general)
}

/// Regional: one gateway on the first public subnet.
/// Zonal: one gateway per AZ on that AZ's first public subnet.
fn plan_nat_gateways(layout: &SubnetLayout, strategy: Option<NatStrategy>) -> Vec<NatGatewayPlan> {
    match strategy {
        None => Vec::new(),
        Some(NatStrategy::Regional) => layout
            .of_type(SubnetType::Public)
            .next()
            .map(|anchor| NatGatewayPlan {
                az_index: None,
                anchor: anchor.key.clone(),
            })
            .into_iter()
            .collect(),
        Some(NatStrategy::Zonal) => {
            let mut by_zone: BTreeMap<usize, SubnetKey> = BTreeMap::new();
            for subnet in layout.of_type(SubnetType::Public) {
                by_zone.entry(subnet.key.az_index).or_insert_with(|| subnet.key.clone());
            }
            by_zone
                .into_iter()
                .map(|(az_index, anchor)| NatGatewayPlan {
                    az_index: Some(az_index),
                    anchor,
                })
                .collect()
        }
    }
}

fn plan_route_domains(
    layout: &SubnetLayout,
    internet_gateway: bool,
    nat_strategy: Option<NatStrategy>,
    nat_gateways: &[NatGatewayPlan],
    context: &str,
) -> Result<Vec<RouteDomainPlan>, SynthError> {
    let mut domains = Vec::new();
    let keys_of = |t: SubnetType| -> Vec<SubnetKey> { layout.of_type(t).map(|s| s.key.clone()).collect() };

    if layout.has_type(SubnetType::Public) {
        domains.push(RouteDomainPlan {
            key: RouteDomainKey::Shared {
                subnet_type: SubnetType::Public,
            },
            default_route: internet_gateway.then_some(RouteTarget::InternetGateway),
            associations: keys_of(SubnetType::Public),
        });
    }

    if layout.has_type(SubnetType::Private) {
        match nat_strategy {
            Some(NatStrategy::Zonal) => {
                let mut by_zone: BTreeMap<usize, Vec<SubnetKey>> = BTreeMap::new();
                for subnet in layout.of_type(SubnetType::Private) {
                    by_zone.entry(subnet.key.az_index).or_default().push(subnet.key.clone());
                }
                for (az_index, associations) in by_zone {
                    let index = nat_gateways
                        .iter()
                        .position(|nat| nat.az_index == Some(az_index))
                        .ok_or_else(|| {
                            SynthError::configuration(
                                context,
                                format!("no NAT gateway serves private subnets in AZ {}", az_index),
                            )
                        })?;
                    domains.push(RouteDomainPlan {
                        key: RouteDomainKey::PerZone {
                            subnet_type: SubnetType::Private,
                            az_index,
                        },
                        default_route: Some(RouteTarget::NatGateway { index }),
                        associations,
                    });
                }
            }
            Some(NatStrategy::Regional) => domains.push(RouteDomainPlan {
                key: RouteDomainKey::Shared {
                    subnet_type: SubnetType::Private,
                },
                default_route: (!nat_gateways.is_empty()).then_some(RouteTarget::NatGateway { index: 0 }),
                associations: keys_of(SubnetType::Private),
            }),
            None => domains.push(RouteDomainPlan {
                key: RouteDomainKey::Shared {
                    subnet_type: SubnetType::Private,
                },
                default_route: None,
                associations: keys_of(SubnetType::Private),
            }),
        }
    }

    if layout.has_type(SubnetType::Transit) {
        domains.push(RouteDomainPlan {
            key: RouteDomainKey::Shared {
                subnet_type: SubnetType::Transit,
            },
            default_route: None,
            associations: keys_of(SubnetType::Transit),
        });
    }

    Ok(domains)
}

/// Transit subnets if any, else private ones; at most one subnet per AZ
fn plan_attachment(
    layout: &SubnetLayout,
    interconnect: &str,
    routing_group: Option<String>,
    context: &str,
) -> Result<AttachmentPlan, SynthError> {
    let subnet_type = if layout.has_type(SubnetType::Transit) {
        SubnetType::Transit
    } else if layout.has_type(SubnetType::Private) {
        SubnetType::Private
    } else {
        return Err(SynthError::configuration(
            context,
            "transit attachment requested but no transit or private subnets exist",
        ));
    };

    let mut by_zone: BTreeMap<usize, SubnetKey> = BTreeMap::new();
    for subnet in layout.of_type(subnet_type) {
        by_zone.entry(subnet.key.az_index).or_insert_with(|| subnet.key.clone());
    }

    Ok(AttachmentPlan {
        interconnect: interconnect.to_string(),
        subnet_type,
        subnets: by_zone.into_values().collect(),
        routing_group,
    })
}
