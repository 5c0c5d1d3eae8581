//! IPv4 address management module.
//!
//! This module handles CIDR block arithmetic, address pools shared across
//! regions, and the carving of a network block into per-zone subnets.

pub mod allocator;
pub mod block;
pub mod pool;

// Re-export commonly used types
pub use allocator::{allocate, SubnetKey, SubnetLayout, SubnetRequest, SubnetSpec};
pub use block::{AddressBlock, CidrError};
pub use pool::{AddressPool, AddressPoolManager, PoolSpec, RegionalPoolHandle};
