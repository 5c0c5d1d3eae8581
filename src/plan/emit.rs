//! Resource declaration.
//!
//! Converts pool, network and segmentation plans into `ResourceDecl`s in a
//! dependency-respecting order: every resource appears after everything it
//! depends on.

use crate::config::GeneralConfig;
use crate::ip::pool::{AddressPoolManager, ORGANIZATION_SCOPE};
use crate::plan::naming::{self, NetworkNames, PoolNames};
use crate::plan::types::{ResourceDecl, ResourceKind};
use crate::topology::builder::{NetworkPlan, ParentOrigin};
use crate::topology::routing_groups::GroupAttachment;
use crate::topology::types::{RouteTarget, SubnetType};
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Pools, their regional handles and organization shares
pub fn emit_pools(pools: &AddressPoolManager, general: &GeneralConfig) -> Vec<ResourceDecl> {
    let prefix = general.name_prefix.as_deref().unwrap_or("");
    let mut resources = Vec::new();

    for pool in pools.pools() {
        let names = PoolNames::new(prefix, &pool.name);
        let cidrs: Vec<Value> = pool.blocks.iter().map(|b| Value::String(b.to_string())).collect();

        resources.push(
            ResourceDecl::new(ResourceKind::IpamPool, names.pool())
                .property("address_family", "ipv4")
                .property("cidrs", cidrs.clone())
                .tags(&general.tags, &names.pool()),
        );

        for handle in pool.regional_handles() {
            let name = names.regional(&handle.region);
            resources.push(
                ResourceDecl::new(ResourceKind::IpamRegionalPool, &name)
                    .property("source_pool", names.pool())
                    .property("locale", handle.region.as_str())
                    .property("cidrs", cidrs.clone())
                    .tags(&general.tags, &name)
                    .depends_on(names.pool()),
            );
        }

        if pool.share_with_organization {
            let mut share = ResourceDecl::new(ResourceKind::ResourceShare, names.share())
                .property("resource", names.pool())
                .property("scope", ORGANIZATION_SCOPE)
                .property("allow_external_principals", false);
            if let Some(share_id) = &pool.share_id {
                share = share.property("share_id", share_id.as_str());
            }
            resources.push(share.tags(&general.tags, &names.share()).depends_on(names.pool()));
        }
    }

    resources
}

/// Every resource of one planned network
pub fn emit_network(plan: &NetworkPlan, name_prefix: &str) -> Vec<ResourceDecl> {
    let names = NetworkNames::new(&plan.resource_prefix);
    let tags = &plan.tags;
    let vpc = names.vpc();
    let mut resources = Vec::new();

    let mut network = ResourceDecl::new(ResourceKind::Vpc, &vpc)
        .property("region", plan.region.as_str())
        .property("cidr_block", plan.parent.block.to_string())
        .property("enable_dns_hostnames", plan.enable_dns_hostnames)
        .property("enable_dns_support", plan.enable_dns_support)
        .property("instance_tenancy", "default");
    if let ParentOrigin::Pool {
        pool, netmask_length, ..
    } = &plan.parent.origin
    {
        let regional = PoolNames::new(name_prefix, pool).regional(&plan.region);
        network = network
            .property("ipv4_ipam_pool", regional.as_str())
            .property("ipv4_netmask_length", *netmask_length)
            .depends_on(regional);
    }
    resources.push(network.tags(tags, &vpc));

    let igw = names.internet_gateway();
    if plan.internet_gateway {
        resources.push(
            ResourceDecl::new(ResourceKind::InternetGateway, &igw)
                .property("vpc", vpc.as_str())
                .tags(tags, &igw)
                .depends_on(&vpc),
        );
    }

    for subnet in &plan.layout.subnets {
        let name = names.subnet(&subnet.key);
        let zone = plan.zone(subnet.key.az_index).unwrap_or_default();
        resources.push(
            ResourceDecl::new(ResourceKind::Subnet, &name)
                .property("vpc", vpc.as_str())
                .property("cidr_block", subnet.block.to_string())
                .property("availability_zone", zone)
                .property("subnet_type", subnet.subnet_type.as_str())
                .property("map_public_ip_on_launch", subnet.subnet_type == SubnetType::Public)
                .tags(tags, &name)
                .depends_on(&vpc),
        );
    }

    for domain in &plan.route_domains {
        let name = names.route_table(&domain.key);
        resources.push(
            ResourceDecl::new(ResourceKind::RouteTable, &name)
                .property("vpc", vpc.as_str())
                .property("route_domain", domain.key.to_string())
                .tags(tags, &name)
                .depends_on(&vpc),
        );
    }

    for domain in &plan.route_domains {
        let table = names.route_table(&domain.key);
        for key in &domain.associations {
            let subnet = names.subnet(key);
            resources.push(
                ResourceDecl::new(ResourceKind::RouteTableAssociation, names.association(key))
                    .property("route_table", table.as_str())
                    .property("subnet", subnet.as_str())
                    .depends_on(&table)
                    .depends_on(subnet),
            );
        }
    }

    for nat in &plan.nat_gateways {
        let eip = names.elastic_ip(nat);
        resources.push(
            ResourceDecl::new(ResourceKind::ElasticIp, &eip)
                .property("domain", "vpc")
                .tags(tags, &eip)
                .depends_on(&igw),
        );

        let name = names.nat_gateway(nat);
        let anchor = names.subnet(&nat.anchor);
        resources.push(
            ResourceDecl::new(ResourceKind::NatGateway, &name)
                .property("subnet", anchor.as_str())
                .property("allocation", eip.as_str())
                .property("connectivity_type", "public")
                .tags(tags, &name)
                .depends_on(&igw)
                .depends_on(eip)
                .depends_on(anchor),
        );
    }

    for domain in &plan.route_domains {
        let Some(target) = domain.default_route else {
            continue;
        };
        let table = names.route_table(&domain.key);
        let route = ResourceDecl::new(ResourceKind::Route, names.default_route(&domain.key))
            .property("route_table", table.as_str())
            .property("destination_cidr_block", DEFAULT_ROUTE)
            .depends_on(&table);
        let route = match target {
            RouteTarget::InternetGateway => route.property("gateway", igw.as_str()).depends_on(&igw),
            RouteTarget::NatGateway { index } => match plan.nat_gateways.get(index) {
                Some(nat) => {
                    let nat = names.nat_gateway(nat);
                    route.property("nat_gateway", nat.as_str()).depends_on(nat)
                }
                None => continue,
            },
        };
        resources.push(route);
    }

    if let Some(attachment) = &plan.attachment {
        let name = names.attachment();
        let subnets: Vec<String> = attachment.subnets.iter().map(|key| names.subnet(key)).collect();
        let mut decl = ResourceDecl::new(ResourceKind::TransitGatewayAttachment, &name)
            .property("transit_gateway_id", attachment.interconnect.as_str())
            .property("vpc", vpc.as_str())
            .property("subnet_type", attachment.subnet_type.as_str())
            .property("subnets", subnets.clone())
            .tags(tags, &name)
            .depends_on(&vpc);
        if let Some(group) = &attachment.routing_group {
            // Segmentation owns association and propagation for grouped attachments.
            decl = decl
                .property("routing_group", group.as_str())
                .property("default_route_table_association", false)
                .property("default_route_table_propagation", false);
        }
        for subnet in subnets {
            decl = decl.depends_on(subnet);
        }
        resources.push(decl);
    }

    for endpoint in &plan.endpoints {
        let name = names.endpoint(endpoint.service);
        let tables: Vec<String> = endpoint.route_domains.iter().map(|key| names.route_table(key)).collect();
        let mut decl = ResourceDecl::new(ResourceKind::VpcEndpoint, &name)
            .property("vpc", vpc.as_str())
            .property("service_name", endpoint.service_name.as_str())
            .property("vpc_endpoint_type", "Gateway")
            .property("route_tables", tables.clone())
            .tags(tags, &name)
            .depends_on(&vpc);
        for table in tables {
            decl = decl.depends_on(table);
        }
        resources.push(decl);
    }

    log::debug!("Declared {} resource(s) for network {}", resources.len(), plan.name);
    resources
}

/// Transit route tables per routing domain plus the association and
/// propagations of each grouped attachment
///
/// `attachments` pairs the logical name of each attachment resource with
/// its group binding.
pub fn emit_segmentation(
    transit_gateway: &str,
    domains: &[String],
    attachments: &[(String, GroupAttachment)],
    general: &GeneralConfig,
) -> Vec<ResourceDecl> {
    let prefix = general.name_prefix.as_deref().unwrap_or("");
    let mut resources = Vec::new();
    let mut tables = BTreeMap::new();

    for domain in domains {
        let name = naming::transit_route_table(prefix, domain);
        resources.push(
            ResourceDecl::new(ResourceKind::TransitRouteTable, &name)
                .property("transit_gateway_id", transit_gateway)
                .property("routing_group", domain.as_str())
                .tags(&general.tags, &name),
        );
        tables.insert(domain.as_str(), name);
    }

    for (attachment, binding) in attachments {
        let Some(table) = tables.get(binding.association.as_str()) else {
            continue;
        };
        resources.push(
            ResourceDecl::new(
                ResourceKind::TransitRouteTableAssociation,
                naming::transit_association(attachment),
            )
            .property("attachment", attachment.as_str())
            .property("transit_route_table", table.as_str())
            .depends_on(attachment)
            .depends_on(table),
        );

        for group in &binding.propagations {
            let Some(table) = tables.get(group.as_str()) else {
                continue;
            };
            resources.push(
                ResourceDecl::new(
                    ResourceKind::TransitRouteTablePropagation,
                    naming::transit_propagation(attachment, group),
                )
                .property("attachment", attachment.as_str())
                .property("transit_route_table", table.as_str())
                .depends_on(attachment)
                .depends_on(table),
            );
        }
    }

    resources
}
