//! Synthesis orchestrator.
//!
//! This module coordinates the overall synthesis process, managing the flow
//! from configuration validation through pool creation, network planning and
//! resource declaration to the artifacts written on disk.

use crate::backend::{
    DryRunBackend, DryRunSharing, OrganizationSharing, ProvisioningBackend, StaticZoneDirectory, ZoneDirectory,
};
use crate::config::{Config, SegmentationConfig};
use crate::error::SynthError;
use crate::ip::pool::AddressPoolManager;
use crate::plan::apply::apply;
use crate::plan::emit::{emit_network, emit_pools, emit_segmentation};
use crate::plan::naming::NetworkNames;
use crate::plan::types::{kind_counts, DeclaredPlan};
use crate::registry::{NetworkHandle, PoolHandle, SegmentationHandle, TopologyRegistry};
use crate::topology::builder::{check_network, plan_network, resolve_parent, NetworkPlan};
use crate::topology::routing_groups::{GroupAttachment, RoutingGroups};
use color_eyre::eyre::WrapErr;
use rayon::prelude::*;
use std::path::Path;

/// Routing-group segmentation as planned
#[derive(Debug, Clone)]
pub struct PlannedSegmentation {
    pub transit_gateway: String,
    pub groups: RoutingGroups,
    pub attachments: Vec<GroupAttachment>,
}

/// Result of synthesizing a configuration, before anything is applied
#[derive(Debug)]
pub struct Synthesis {
    pub name_prefix: String,
    pub pools: AddressPoolManager,
    pub networks: Vec<NetworkPlan>,
    pub segmentation: Option<PlannedSegmentation>,
    pub plan: DeclaredPlan,
}

/// Validate a configuration and plan every pool, network and routing group.
///
/// Every check runs before any resource is declared, so an invalid
/// configuration yields an error and no partial plan.
///
/// # Arguments
/// * `config` - Parsed configuration
/// * `zones` - Zone directory used to resolve availability zones
/// * `sharing` - Organization-sharing backend for shared pools
pub fn synthesize(
    config: &Config,
    zones: &dyn ZoneDirectory,
    sharing: &dyn OrganizationSharing,
) -> Result<Synthesis, SynthError> {
    config.validate()?;

    let groups = match &config.segmentation {
        Some(segmentation) => Some(RoutingGroups::declare(&segmentation.groups)?),
        None => None,
    };

    let checked = config
        .networks
        .iter()
        .map(check_network)
        .collect::<Result<Vec<_>, _>>()?;

    for network in &checked {
        let group = network
            .config
            .transit_gateway
            .as_ref()
            .and_then(|t| t.routing_group.as_deref());
        if let (Some(group), Some(groups)) = (group, &groups) {
            if !groups.is_declared(group) {
                return Err(SynthError::not_found("routing group", group));
            }
        }
    }

    let mut pools = AddressPoolManager::new();
    for spec in &config.pools {
        pools.create_pool(spec)?;
    }

    // Pool ledger updates are order-dependent; keep them in declaration order.
    let parents = checked
        .iter()
        .map(|network| resolve_parent(network, &mut pools))
        .collect::<Result<Vec<_>, _>>()?;

    let networks = checked
        .par_iter()
        .zip(parents.into_par_iter())
        .map(|(network, parent)| plan_network(network, parent, zones, &config.general))
        .collect::<Result<Vec<_>, _>>()?;

    let shared = pools.share_pools(sharing)?;
    for (pool, share_id) in &shared {
        log::info!("Pool {} shared as {}", pool, share_id);
    }

    let segmentation = match (&config.segmentation, groups) {
        (Some(segmentation), Some(groups)) => Some(plan_segmentation(segmentation, groups, &networks)?),
        _ => None,
    };

    let name_prefix = config.name_prefix().to_string();
    let mut plan = DeclaredPlan::default();
    plan.extend(emit_pools(&pools, &config.general));
    for network in &networks {
        plan.extend(emit_network(network, &name_prefix));
    }
    if let Some(segmentation) = &segmentation {
        plan.extend(emit_segmentation(
            &segmentation.transit_gateway,
            &segmentation.groups.domains(),
            &attachment_bindings(&segmentation.attachments, &networks),
            &config.general,
        ));
    }

    let violations = plan.ordering_violations();
    if let Some(first) = violations.first() {
        return Err(SynthError::configuration("declared plan", first.clone()));
    }

    for (kind, count) in kind_counts(&plan.resources) {
        log::debug!("  {:?}: {}", kind, count);
    }
    log::info!(
        "Synthesized {} network(s) and {} pool(s) into {} resource declaration(s)",
        networks.len(),
        config.pools.len(),
        plan.resources.len()
    );

    Ok(Synthesis {
        name_prefix,
        pools,
        networks,
        segmentation,
        plan,
    })
}

fn plan_segmentation(
    config: &SegmentationConfig,
    groups: RoutingGroups,
    networks: &[NetworkPlan],
) -> Result<PlannedSegmentation, SynthError> {
    let mut attachments = Vec::new();
    for network in networks {
        let Some(group) = network.attachment.as_ref().and_then(|a| a.routing_group.as_deref()) else {
            continue;
        };
        attachments.push(groups.attach(&network.name, group)?);
    }

    Ok(PlannedSegmentation {
        transit_gateway: config.transit_gateway.clone(),
        groups,
        attachments,
    })
}

/// Pair each group binding with the logical name of its network's attachment
fn attachment_bindings(attachments: &[GroupAttachment], networks: &[NetworkPlan]) -> Vec<(String, GroupAttachment)> {
    attachments
        .iter()
        .filter_map(|binding| {
            networks
                .iter()
                .find(|n| n.name == binding.network)
                .map(|n| (NetworkNames::new(&n.resource_prefix).attachment(), binding.clone()))
        })
        .collect()
}

/// Apply a synthesis through a provisioning backend and collect the handles
pub fn realize(synthesis: &Synthesis, backend: &mut dyn ProvisioningBackend) -> Result<TopologyRegistry, SynthError> {
    let realized = apply(&synthesis.plan, backend)?;

    let pools = synthesis
        .pools
        .pools()
        .map(|pool| PoolHandle::resolve(pool, &synthesis.name_prefix, &realized))
        .collect::<Result<Vec<_>, _>>()?;

    let networks = synthesis
        .networks
        .iter()
        .map(|plan| NetworkHandle::resolve(plan, &realized))
        .collect::<Result<Vec<_>, _>>()?;

    let segmentation = match &synthesis.segmentation {
        Some(s) => Some(SegmentationHandle::resolve(
            &s.transit_gateway,
            &s.groups.domains(),
            &s.attachments,
            &synthesis.name_prefix,
            &realized,
        )?),
        None => None,
    };

    Ok(TopologyRegistry {
        generated_at: chrono::Utc::now(),
        pools,
        networks,
        segmentation,
    })
}

/// Synthesize with the dry-run collaborators and write `plan.yaml` and
/// `topology.json` into `output_dir`.
///
/// # Returns
/// * The registry written to `topology.json`
pub fn generate(config: &Config, output_dir: &Path) -> color_eyre::eyre::Result<TopologyRegistry> {
    let zones = StaticZoneDirectory::new(config.zones.clone());
    let sharing = DryRunSharing::default();
    let synthesis = synthesize(config, &zones, &sharing)?;

    let mut backend = DryRunBackend::new();
    let registry = realize(&synthesis, &mut backend)?;

    std::fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory {:?}", output_dir))?;

    let plan_path = output_dir.join("plan.yaml");
    let plan_yaml = serde_yaml::to_string(&synthesis.plan)?;
    std::fs::write(&plan_path, plan_yaml).wrap_err_with(|| format!("Failed to write {:?}", plan_path))?;

    let registry_path = output_dir.join("topology.json");
    let registry_json = serde_json::to_string_pretty(&registry)?;
    std::fs::write(&registry_path, registry_json).wrap_err_with(|| format!("Failed to write {:?}", registry_path))?;

    log::info!("Wrote resource plan to {:?}", plan_path);
    log::info!("Wrote topology registry to {:?}", registry_path);
    for network in &registry.networks {
        log::info!(
            "  - {} ({}): {} subnet(s), {} NAT gateway(s)",
            network.name,
            network.parent_block,
            network.subnets.len(),
            network.nat_gateway_ids.len()
        );
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::ResourceKind;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
general:
  name_prefix: acme
pools:
  - name: core
    cidrs: ["10.0.0.0/12"]
    operating_regions: [us-east-1, eu-west-1]
    share_with_organization: true
segmentation:
  transit_gateway: tgw-shared
  groups:
    production: {}
    development:
      allowed_groups: [test]
    test:
      allowed_groups: [development]
networks:
  - name: prod
    region: us-east-1
    ipam_pool:
      pool: core
      netmask_length: 16
    availability_zones: 2
    nat_gateway:
      enabled: true
    transit_gateway:
      id: tgw-shared
      routing_group: production
    subnets:
      - name: public
        type: public
        subnet_prefix: 24
      - name: private
        type: private
        subnet_prefix: 24
  - name: dev
    region: eu-west-1
    ipam_pool:
      pool: core
      netmask_length: 16
    availability_zones: 1
    transit_gateway:
      id: tgw-shared
      routing_group: development
    subnets:
      - name: private
        type: private
        subnet_prefix: 24
"#;

    fn config() -> Config {
        serde_yaml::from_str(CONFIG).unwrap()
    }

    fn run(config: &Config) -> Result<Synthesis, SynthError> {
        synthesize(config, &StaticZoneDirectory::default(), &DryRunSharing::default())
    }

    #[test]
    fn test_synthesize_pool_backed_networks() {
        let synthesis = run(&config()).unwrap();
        assert_eq!(synthesis.networks[0].parent.block.to_string(), "10.0.0.0/16");
        assert_eq!(synthesis.networks[1].parent.block.to_string(), "10.1.0.0/16");
        assert!(synthesis.plan.ordering_violations().is_empty());
        assert_eq!(synthesis.plan.count_of(ResourceKind::ResourceShare), 1);
        assert_eq!(synthesis.plan.count_of(ResourceKind::TransitRouteTable), 4);
        assert_eq!(synthesis.plan.count_of(ResourceKind::TransitGatewayAttachment), 2);

        let segmentation = synthesis.segmentation.as_ref().unwrap();
        assert_eq!(segmentation.attachments.len(), 2);
        assert_eq!(segmentation.attachments[1].propagations, vec!["hub", "development", "test"]);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let a = run(&config()).unwrap();
        let b = run(&config()).unwrap();
        assert_eq!(a.plan, b.plan);
        assert_eq!(a.networks, b.networks);
    }

    #[test]
    fn test_invalid_configuration_declares_nothing() {
        let mut config = config();
        config.networks[1].nat_gateway.enabled = true;
        let err = run(&config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_undeclared_routing_group() {
        let mut config = config();
        config.networks[1].transit_gateway.as_mut().unwrap().routing_group = Some("staging".to_string());
        assert!(run(&config).unwrap_err().is_not_found());
    }

    #[test]
    fn test_subnet_names_do_not_collide_with_gateways() {
        let mut config = config();
        config.networks[0].subnets[0].name = "nat".to_string();
        config.networks[0].subnets[1].name = "rt-private".to_string();

        let synthesis = run(&config).unwrap();
        assert!(synthesis.plan.ordering_violations().is_empty());
        assert_eq!(synthesis.plan.get("acme-prod-subnet-nat-0").unwrap().kind, ResourceKind::Subnet);
        assert_eq!(synthesis.plan.get("acme-prod-nat-0").unwrap().kind, ResourceKind::NatGateway);
        assert_eq!(synthesis.plan.get("acme-prod-subnet-rt-private-1").unwrap().kind, ResourceKind::Subnet);
        assert_eq!(synthesis.plan.get("acme-prod-rt-private-1").unwrap().kind, ResourceKind::RouteTable);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut config = config();
        config.pools[0].cidrs = vec!["10.0.0.0/16".to_string()];
        assert!(run(&config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_realize_and_generate() {
        let config = config();
        let synthesis = run(&config).unwrap();
        let registry = realize(&synthesis, &mut DryRunBackend::new()).unwrap();

        let prod = registry.network("prod").unwrap();
        assert_eq!(prod.id, "vpc-acme-prod-vpc");
        assert_eq!(prod.routing_group.as_deref(), Some("production"));
        assert_eq!(registry.pool("core").unwrap().share_id.as_deref(), Some("share-ipam-pool-core"));
        assert_eq!(registry.segmentation.as_ref().unwrap().route_table_ids.len(), 4);

        let dir = TempDir::new().unwrap();
        let written = generate(&config, dir.path()).unwrap();
        assert_eq!(written.networks.len(), 2);

        let plan = std::fs::read_to_string(dir.path().join("plan.yaml")).unwrap();
        assert!(plan.contains("acme-prod-nat-0"));
        let topology: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("topology.json")).unwrap()).unwrap();
        assert_eq!(topology["networks"][1]["parent_block"], "10.1.0.0/16");
        assert!(topology["generated_at"].is_string());
    }
}
