//! # vpcsynth - Deterministic cloud network topology synthesizer
//!
//! This library plans cloud network topologies: address pools shared across
//! regions, networks carved into per-zone subnets, route tables, internet
//! and NAT gateways, transit attachments and routing-group segmentation on
//! a shared transit hub.
//!
//! ## Overview
//!
//! Synthesis is a pure function of the configuration and the zone list:
//! the same inputs always produce the same address plan and the same
//! declared resource graph. Talking to a cloud provider is left to a
//! provisioning backend that consumes the declared graph.
//!
//! ## Key Features
//!
//! - **Address pools**: Non-overlapping blocks with one handle per operating region
//! - **Subnet allocation**: Explicit ledger, safe for mixed subnet sizes
//! - **NAT strategies**: One gateway per zone (zonal) or one per network (regional)
//! - **Transit attachments**: Transit subnets first, private subnets as fallback
//! - **Segmentation**: Routing groups with an implicit, always-reachable hub
//! - **Fail fast**: Every check runs before any resource is declared
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Configuration structures and structural validation
//! - `config_loader`: Configuration file loading and legacy migration
//! - `error`: Validation, configuration and not-found errors
//! - `ip`: CIDR blocks, address pools and subnet allocation
//! - `topology`: Network planning and routing-group segmentation
//! - `plan`: Declared resource graph, naming and application
//! - `backend`: Zone directory, sharing and provisioning collaborators
//! - `registry`: Handles consumed by downstream components
//! - `orchestrator`: End-to-end synthesis and artifact generation
//! - `utils`: Input validation helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vpcsynth::{config_loader, orchestrator};
//!
//! // Load configuration from YAML file
//! let config = config_loader::load_config(Path::new("topology.yaml"))?;
//!
//! // Synthesize and write artifacts
//! let registry = orchestrator::generate(&config, Path::new("vpcsynth_output"))?;
//!
//! // The vpcsynth_output directory now contains:
//! // - plan.yaml: every declared resource with its dependencies
//! // - topology.json: network, pool and segmentation handles
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   name_prefix: acme
//!   tags:
//!     Environment: production
//!
//! pools:
//!   - name: core
//!     cidrs: ["10.0.0.0/8"]
//!     operating_regions: [us-east-1, eu-west-1]
//!     share_with_organization: true
//!
//! networks:
//!   - name: prod
//!     region: us-east-1
//!     ipam_pool: { pool: core, netmask_length: 16 }
//!     availability_zones: 2
//!     nat_gateway: { enabled: true, strategy: zonal }
//!     subnets:
//!       - { name: public, type: public, subnet_prefix: 24 }
//!       - { name: private, type: private, subnet_prefix: 24 }
//! ```
//!
//! ## Error Handling
//!
//! Planning functions return `SynthError`, which names the offending field,
//! value and constraint. The loader, orchestrator and binary wrap these in
//! `color_eyre` reports with file-system context.

pub mod backend;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod ip;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod topology;
pub mod utils;

pub use config::Config;
pub use error::SynthError;
