use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use vpcsynth::backend::{DryRunSharing, StaticZoneDirectory};
use vpcsynth::config::Config;
use vpcsynth::{config_loader, orchestrator};

/// Deterministic cloud network topology synthesizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for plan.yaml and topology.json
    #[arg(short, long, default_value = "vpcsynth_output")]
    output: PathBuf,

    /// Migrate legacy subnet sizing (cidr_prefix) to subnet_prefix
    #[arg(long)]
    migrate: bool,

    /// Output path for migrated configuration
    #[arg(long, requires = "migrate")]
    migrate_output: Option<PathBuf>,

    /// Validate and plan without writing any artifacts
    #[arg(long, conflicts_with = "migrate")]
    check: bool,
}

/// Log level from `general.log_level`, read before the logger exists
fn configured_log_level(config_path: &Path) -> String {
    fs::read_to_string(config_path)
        .ok()
        .and_then(|content| serde_yaml::from_str::<Config>(&content).ok())
        .and_then(|config| config.general.log_level)
        .unwrap_or_else(|| "info".to_string())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // RUST_LOG wins over the configured level
    let level = configured_log_level(&args.config);
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("Starting vpcsynth v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {:?}", args.config);

    // Handle migration if requested
    if args.migrate {
        let output_path = args.migrate_output.unwrap_or_else(|| {
            let mut path = args.config.clone();
            path.set_extension("migrated.yaml");
            path
        });

        config_loader::migrate_config(&args.config, &output_path)?;
        info!("Configuration migrated successfully to: {:?}", output_path);
        return Ok(());
    }

    // Check configuration compatibility
    let warnings = config_loader::check_config_compatibility(&args.config)?;
    if warnings > 0 {
        warn!("{} deprecated construct(s) found in {:?}", warnings, args.config);
    }

    let config = config_loader::load_config(&args.config)?;

    if args.check {
        let zones = StaticZoneDirectory::new(config.zones.clone());
        let synthesis = orchestrator::synthesize(&config, &zones, &DryRunSharing::default())
            .wrap_err("Topology synthesis failed")?;
        info!(
            "Configuration is valid: {} network(s), {} resource(s) planned",
            synthesis.networks.len(),
            synthesis.plan.resources.len()
        );
        return Ok(());
    }

    info!("Output directory: {:?}", args.output);
    let registry = orchestrator::generate(&config, &args.output)?;

    info!(
        "Synthesized {} network(s) into {:?}",
        registry.networks.len(),
        args.output
    );
    info!("Topology synthesis completed successfully");
    Ok(())
}
