//! Declarative resource plan module.
//!
//! This module turns planned pools, networks and routing groups into an
//! ordered resource graph and applies that graph through a provisioning
//! backend.

pub mod apply;
pub mod emit;
pub mod naming;
pub mod types;

pub use apply::{apply, RealizedResources};
pub use emit::{emit_network, emit_pools, emit_segmentation};
pub use types::{DeclaredPlan, ResourceDecl, ResourceKind};
