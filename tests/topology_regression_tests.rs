#[cfg(test)]
mod topology_regression_tests {
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    use vpcsynth::backend::{DryRunBackend, DryRunSharing, StaticZoneDirectory};
    use vpcsynth::config_loader::{load_config, migrate_config};
    use vpcsynth::ip::block::AddressBlock;
    use vpcsynth::orchestrator::{generate, realize, synthesize};
    use vpcsynth::plan::types::ResourceKind;
    use vpcsynth::topology::types::SubnetType;
    use vpcsynth::Config;

    const MULTI_REGION: &str = r#"
general:
  name_prefix: acme
  tags:
    CreatedBy: vpcsynth
zones:
  us-east-1: [use1-az1, use1-az2, use1-az4]
pools:
  - name: core
    cidrs: ["10.0.0.0/14", "172.16.0.0/12"]
    operating_regions: [us-east-1, eu-west-1]
    share_with_organization: true
segmentation:
  transit_gateway: tgw-0a1b2c
  groups:
    production: {}
    development:
      allowed_groups: [test]
    test:
      allowed_groups: [development]
networks:
  - name: prod
    region: us-east-1
    ipam_pool: { pool: core, netmask_length: 16 }
    availability_zones: 3
    nat_gateway: { enabled: true, strategy: zonal }
    transit_gateway: { id: tgw-0a1b2c, routing_group: production }
    gateway_endpoints: [s3, dynamodb]
    subnets:
      - { name: public, type: public, subnet_prefix: 24 }
      - { name: app, type: private, subnet_prefix: 20 }
      - { name: tgw, type: transit, subnet_prefix: 28 }
  - name: staging
    region: eu-west-1
    ipam_pool: { pool: core, netmask_length: 16 }
    availability_zones: 2
    nat_gateway: { enabled: true, strategy: regional }
    transit_gateway: { id: tgw-0a1b2c, routing_group: development }
    subnets:
      - { name: public, type: public, subnet_prefix: 24 }
      - { name: app, type: private, subnet_prefix: 24 }
  - name: lab
    region: us-east-1
    cidr_block: "192.168.0.0/20"
    availability_zones: 1
    internet_gateway: false
    subnets:
      - { name: isolated, type: private, subnet_prefix: 24 }
"#;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        temp_file
    }

    fn load(yaml: &str) -> Config {
        let file = write_config(yaml);
        load_config(file.path()).unwrap()
    }

    /// Full flow: YAML -> synthesis -> applied handles
    #[test]
    fn test_multi_region_synthesis() {
        let config = load(MULTI_REGION);
        let zones = StaticZoneDirectory::new(config.zones.clone());
        let synthesis = synthesize(&config, &zones, &DryRunSharing::default()).unwrap();

        assert!(synthesis.plan.ordering_violations().is_empty());
        assert_eq!(synthesis.networks.len(), 3);

        let prod = &synthesis.networks[0];
        assert_eq!(prod.parent.block.to_string(), "10.0.0.0/16");
        assert_eq!(prod.zones, vec!["use1-az1", "use1-az2", "use1-az4"]);
        assert_eq!(prod.nat_gateways.len(), 3);

        let staging = &synthesis.networks[1];
        assert_eq!(staging.parent.block.to_string(), "10.1.0.0/16");
        assert_eq!(staging.zones, vec!["eu-west-1a", "eu-west-1b"]);
        assert_eq!(staging.nat_gateways.len(), 1);

        let registry = realize(&synthesis, &mut DryRunBackend::new()).unwrap();
        let prod = registry.network("prod").unwrap();
        assert_eq!(prod.subnet_ids_by_type(SubnetType::Public).len(), 3);
        assert_eq!(prod.subnet_id("tgw", 2).unwrap(), "subnet-acme-prod-subnet-tgw-2");
        assert_eq!(prod.nat_gateway_ids.len(), 3);
        assert_eq!(prod.endpoint_ids.len(), 2);
        assert!(prod.external_attachment_id.is_some());

        let lab = registry.network("lab").unwrap();
        assert_eq!(lab.parent_block, "192.168.0.0/20");
        assert!(lab.internet_gateway_id.is_none());
        assert!(lab.nat_gateway_ids.is_empty());
        assert!(lab.external_attachment_id.is_none());

        let pool = registry.pool("core").unwrap();
        assert_eq!(pool.regional_pool_ids.len(), 2);
        assert!(pool.share_id.is_some());
    }

    /// Subnets never overlap and stay inside the parent, even with mixed sizes
    #[test]
    fn test_mixed_subnet_sizes_stay_disjoint() {
        let config = load(MULTI_REGION);
        let synthesis = synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap();

        for network in &synthesis.networks {
            let subnets = &network.layout.subnets;
            for (i, a) in subnets.iter().enumerate() {
                assert!(network.parent.block.contains(&a.block), "{} outside {}", a.block, network.parent.block);
                for b in subnets.iter().skip(i + 1) {
                    assert!(!a.block.overlaps(&b.block), "{} overlaps {}", a.block, b.block);
                }
            }
        }

        let prod = &synthesis.networks[0];
        let app0 = prod.layout.get("app", 0).unwrap().block;
        assert_eq!(app0.prefix_len(), 20);
        assert_eq!(app0.base().octets()[2] % 16, 0);
    }

    /// Zonal NAT wires every zone's private route table to its own gateway
    #[test]
    fn test_zonal_nat_routes() {
        let config = load(MULTI_REGION);
        let synthesis = synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap();

        for az in 0..3 {
            let route = synthesis
                .plan
                .get(&format!("acme-prod-rt-private-{}-default", az))
                .unwrap();
            assert_eq!(route.string("nat_gateway"), Some(format!("acme-prod-nat-{}", az).as_str()));
        }
        assert_eq!(
            synthesis.plan.get("acme-staging-rt-private-default").unwrap().string("nat_gateway"),
            Some("acme-staging-nat")
        );
    }

    /// Segmentation: production never propagates into test
    #[test]
    fn test_segmentation_propagations() {
        let config = load(MULTI_REGION);
        let synthesis = synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap();

        let propagations: Vec<&str> = synthesis
            .plan
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::TransitRouteTablePropagation)
            .map(|r| r.name.as_str())
            .collect();

        assert!(propagations.contains(&"acme-prod-tgw-attachment-prop-hub"));
        assert!(propagations.contains(&"acme-prod-tgw-attachment-prop-production"));
        assert!(!propagations.contains(&"acme-prod-tgw-attachment-prop-test"));
        assert!(propagations.contains(&"acme-staging-tgw-attachment-prop-test"));
    }

    /// The same configuration always yields the same plan
    #[test]
    fn test_repeatable_plans() {
        let config = load(MULTI_REGION);
        let run = || synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap();
        let first = serde_yaml::to_string(&run().plan).unwrap();
        let second = serde_yaml::to_string(&run().plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overlapping_pool_blocks_rejected() {
        let yaml = MULTI_REGION.replace(r#"["10.0.0.0/14", "172.16.0.0/12"]"#, r#"["10.0.0.0/8", "10.1.0.0/16"]"#);
        let config = load(&yaml);
        let err = synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_reserved_hub_group_rejected() {
        let yaml = MULTI_REGION.replace("    production: {}", "    production: {}\n    hub: {}");
        let config = load(&yaml);
        let err = synthesize(&config, &StaticZoneDirectory::default(), &DryRunSharing::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_generate_writes_artifacts() {
        let config = load(MULTI_REGION);
        let dir = TempDir::new().unwrap();
        generate(&config, dir.path()).unwrap();

        let plan = std::fs::read_to_string(dir.path().join("plan.yaml")).unwrap();
        assert!(plan.contains("kind: nat_gateway"));
        assert!(plan.contains("com.amazonaws.us-east-1.s3"));

        let topology: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("topology.json")).unwrap()).unwrap();
        assert_eq!(topology["networks"][0]["id"], "vpc-acme-prod-vpc");
        assert_eq!(topology["segmentation"]["transit_gateway"], "tgw-0a1b2c");
    }

    #[test]
    fn test_legacy_sizing_migrates_to_same_plan() {
        let legacy = MULTI_REGION.replace(
            "{ name: public, type: public, subnet_prefix: 24 }",
            "{ name: public, type: public, cidr_prefix: 8 }",
        );
        let old = write_config(&legacy);
        let new = NamedTempFile::new().unwrap();
        assert!(migrate_config(old.path(), new.path()).unwrap() >= 2);

        let before = load(&legacy);
        let after = load_config(new.path()).unwrap();
        let zones = StaticZoneDirectory::default();
        let a = synthesize(&before, &zones, &DryRunSharing::default()).unwrap();
        let b = synthesize(&after, &zones, &DryRunSharing::default()).unwrap();
        assert_eq!(a.plan, b.plan);
    }

    #[test]
    fn test_nth_sub_block_is_disjoint() {
        let parent = AddressBlock::parse("10.0.0.0/16").unwrap();
        let a = parent.nth_sub_block(24, 3).unwrap();
        let b = parent.nth_sub_block(24, 4).unwrap();
        assert!(!a.overlaps(&b));
        assert_eq!(a, parent.nth_sub_block(24, 3).unwrap());
        assert!(parent.nth_sub_block(16, 0).is_err());
    }
}
