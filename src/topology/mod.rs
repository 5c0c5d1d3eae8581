//! Network topology module.
//!
//! This module plans networks (subnets, route domains, gateways, transit
//! attachments) and the routing-group segmentation of a shared transit hub.

pub mod builder;
pub mod routing_groups;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::{build, check_network, plan_network, resolve_parent, NetworkPlan, ParentOrigin, ResolvedParent};
pub use routing_groups::{GroupAttachment, RoutingGroups, HUB};
pub use types::{NatStrategy, RouteDomainKey, RouteTarget, SubnetType};
