use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    // Open the configuration file
    let file = File::open(config_path).wrap_err_with(|| format!("Failed to open config file {:?}", config_path))?;

    // Parse the YAML content
    let config: Config =
        serde_yaml::from_reader(file).wrap_err_with(|| format!("Failed to parse config file {:?}", config_path))?;

    info!(
        "Configuration declares {} pool(s) and {} network(s)",
        config.pools.len(),
        config.networks.len()
    );

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// Warn about deprecated or suspicious constructs in a configuration file
///
/// Returns the number of warnings emitted.
pub fn check_config_compatibility(config_path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read config file {:?}", config_path))?;
    let config: Config = serde_yaml::from_str(&content)?;
    let mut warnings = 0;

    for network in &config.networks {
        for subnet in network.subnets.iter().filter(|s| s.cidr_prefix.is_some()) {
            warn!(
                "Network '{}' subnet '{}' uses the deprecated cidr_prefix (extra host bits). \
                 Run with --migrate to rewrite it as an absolute subnet_prefix.",
                network.name, subnet.name
            );
            warnings += 1;
        }
    }

    let referenced: BTreeSet<&str> = config
        .networks
        .iter()
        .filter_map(|n| n.ipam_pool.as_ref().map(|p| p.pool.as_str()))
        .collect();
    for pool in config.pools.iter().filter(|p| !referenced.contains(p.name.as_str())) {
        info!("Pool '{}' is declared but no network draws from it", pool.name);
    }

    Ok(warnings)
}

/// Rewrite legacy subnet sizing into the canonical form
///
/// Every `cidr_prefix` (extra host bits) becomes an absolute `subnet_prefix`
/// computed from the network's parent prefix length. Returns the number of
/// subnets rewritten.
pub fn migrate_config(old_config_path: &Path, new_config_path: &Path) -> Result<usize> {
    info!("Migrating configuration from {:?} to {:?}", old_config_path, new_config_path);

    let content = std::fs::read_to_string(old_config_path)
        .wrap_err_with(|| format!("Failed to read config file {:?}", old_config_path))?;
    let mut config: Config = serde_yaml::from_str(&content)?;
    let mut rewritten = 0;

    for network in &mut config.networks {
        let parent_prefix = network.parent_source()?.prefix_len();
        for subnet in &mut network.subnets {
            let Some(extra_bits) = subnet.cidr_prefix else {
                continue;
            };
            if subnet.subnet_prefix.is_some() {
                warn!(
                    "Subnet '{}' in network '{}' sets both subnet_prefix and cidr_prefix; keeping subnet_prefix",
                    subnet.name, network.name
                );
            } else {
                subnet.subnet_prefix = Some(parent_prefix.saturating_add(extra_bits));
            }
            subnet.cidr_prefix = None;
            rewritten += 1;
        }
    }

    let new_content = serde_yaml::to_string(&config)?;
    std::fs::write(new_config_path, new_content)
        .wrap_err_with(|| format!("Failed to write migrated config {:?}", new_config_path))?;

    if rewritten == 0 {
        info!("Migration complete: configuration was already canonical");
    } else {
        info!("Migration complete: rewrote {} subnet(s) to subnet_prefix", rewritten);
    }

    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LEGACY: &str = r#"
pools:
  - name: core
    cidrs: ["10.0.0.0/8"]
    operating_regions: [us-east-1]
networks:
  - name: prod
    region: us-east-1
    ipam_pool:
      pool: core
      netmask_length: 20
    availability_zones: 2
    subnets:
      - name: public
        type: public
        cidr_prefix: 4
      - name: private
        type: private
        subnet_prefix: 24
"#;

    fn temp_config(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        temp_file
    }

    #[test]
    fn test_load_config() {
        let temp_file = temp_config(LEGACY);
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.pools[0].name, "core");
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let temp_file = temp_config(&LEGACY.replace("region: us-east-1", "region: useast1"));
        assert!(load_config(temp_file.path()).is_err());

        assert!(load_config(Path::new("/nonexistent/vpcsynth.yaml")).is_err());
    }

    #[test]
    fn test_compatibility_check_counts_legacy_sizing() {
        let temp_file = temp_config(LEGACY);
        assert_eq!(check_config_compatibility(temp_file.path()).unwrap(), 1);
    }

    #[test]
    fn test_migrate_legacy_sizing() {
        let old = temp_config(LEGACY);
        let new = NamedTempFile::new().unwrap();

        assert_eq!(migrate_config(old.path(), new.path()).unwrap(), 1);

        let migrated = load_config(new.path()).unwrap();
        let public = &migrated.networks[0].subnets[0];
        assert_eq!(public.subnet_prefix, Some(24));
        assert_eq!(public.cidr_prefix, None);
        assert_eq!(check_config_compatibility(new.path()).unwrap(), 0);

        // Migrating a canonical file changes nothing.
        let again = NamedTempFile::new().unwrap();
        assert_eq!(migrate_config(new.path(), again.path()).unwrap(), 0);
    }
}
