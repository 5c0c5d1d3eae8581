//! Configuration validation utilities.
//!
//! This module provides the field-level checks shared by the pool manager,
//! the subnet allocator and the topology builder: region names, prefix
//! length ranges, availability-zone counts and logical resource names.

use crate::error::SynthError;
use regex::Regex;
use std::sync::OnceLock;

/// Allowed prefix lengths for blocks provisioned into a pool
pub const POOL_PREFIX_RANGE: (u8, u8) = (8, 28);

/// Allowed prefix lengths for a network's parent block (manual CIDR or pool netmask)
pub const NETWORK_PREFIX_RANGE: (u8, u8) = (16, 28);

/// Allowed absolute subnet prefix lengths
pub const SUBNET_PREFIX_RANGE: (u8, u8) = (8, 30);

/// Allowed legacy "extra host bits" values
pub const LEGACY_EXTRA_BITS_RANGE: (u8, u8) = (1, 16);

/// Allowed availability-zone counts per network
pub const AZ_COUNT_RANGE: (usize, usize) = (1, 6);

const REGION_PATTERN: &str = r"^[a-z]{2}-[a-z]+-\d+$";
const NAME_PATTERN: &str = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$";

fn region_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REGION_PATTERN).expect("region pattern compiles"))
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern compiles"))
}

/// Validate a cloud region name such as `us-east-1`
///
/// # Examples
/// ```
/// use vpcsynth::utils::validation::validate_region;
///
/// assert!(validate_region("pools[0].operating_regions", "eu-west-1").is_ok());
/// assert!(validate_region("pools[0].operating_regions", "EU-West-1").is_err());
/// assert!(validate_region("pools[0].operating_regions", "useast1").is_err());
/// ```
pub fn validate_region(field: &str, region: &str) -> Result<(), SynthError> {
    if region_regex().is_match(region) {
        Ok(())
    } else {
        Err(SynthError::validation(
            field,
            region,
            format!("region must match {}", REGION_PATTERN),
        ))
    }
}

/// Validate a logical name used to build resource names
///
/// Names are lowercase alphanumerics and inner hyphens, so that
/// `{prefix}-{network}-{role}` stays a valid identifier everywhere.
pub fn validate_name(field: &str, name: &str) -> Result<(), SynthError> {
    if name_regex().is_match(name) {
        Ok(())
    } else {
        Err(SynthError::validation(
            field,
            name,
            "names must be lowercase alphanumerics separated by hyphens",
        ))
    }
}

/// Validate that a prefix length lies in an inclusive range
///
/// # Examples
/// ```
/// use vpcsynth::utils::validation::{validate_prefix_range, POOL_PREFIX_RANGE};
///
/// assert!(validate_prefix_range("pools[0].cidrs", 16, POOL_PREFIX_RANGE).is_ok());
/// assert!(validate_prefix_range("pools[0].cidrs", 30, POOL_PREFIX_RANGE).is_err());
/// ```
pub fn validate_prefix_range(field: &str, prefix_len: u8, range: (u8, u8)) -> Result<(), SynthError> {
    let (min, max) = range;
    if prefix_len < min || prefix_len > max {
        return Err(SynthError::validation(
            field,
            format!("/{}", prefix_len),
            format!("prefix length must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// Validate a network's availability-zone count
pub fn validate_az_count(field: &str, count: usize) -> Result<(), SynthError> {
    let (min, max) = AZ_COUNT_RANGE;
    if count < min || count > max {
        return Err(SynthError::validation(
            field,
            count,
            format!("availability zone count must be between {} and {}", min, max),
        ));
    }
    Ok(())
}
