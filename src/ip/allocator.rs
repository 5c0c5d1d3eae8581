//! Subnet allocation.
//!
//! Carves a network's parent block into one child block per
//! (subnet spec, availability-zone index) pair. Specs are processed in
//! declaration order against an explicit ledger counted in units of the
//! smallest subnet in use. Every block is aligned to its own size, so specs
//! with different prefix lengths never overlap. For uniform prefix lengths
//! the result is identical to numbering blocks `offset + az_index`.

use crate::error::SynthError;
use crate::ip::block::{AddressBlock, CidrError};
use crate::topology::types::SubnetType;
use crate::utils::validation::{validate_name, validate_prefix_range, LEGACY_EXTRA_BITS_RANGE, SUBNET_PREFIX_RANGE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A subnet template as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub subnet_type: SubnetType,
    /// Absolute child prefix length (canonical form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_prefix: Option<u8>,
    /// Extra host bits added to the parent prefix (legacy form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_prefix: Option<u8>,
    /// Defaults to the network's AZ count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<usize>,
}

/// A validated subnet template with an absolute prefix length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub subnet_type: SubnetType,
    pub prefix_len: u8,
    pub az_count: usize,
}

impl SubnetSpec {
    /// Resolve a request against its network's parent prefix and AZ count.
    ///
    /// `subnet_prefix` and the legacy `cidr_prefix` are mutually exclusive;
    /// the legacy form becomes `parent_prefix + cidr_prefix`.
    pub fn resolve(request: &SubnetRequest, parent_prefix: u8, network_az_count: usize) -> Result<Self, SynthError> {
        let field = format!("subnets[{}]", request.name);
        validate_name(&format!("{}.name", field), &request.name)?;

        let prefix_len = match (request.subnet_prefix, request.cidr_prefix) {
            (Some(_), Some(_)) => {
                return Err(SynthError::validation(
                    &field,
                    "subnet_prefix + cidr_prefix",
                    "set either subnet_prefix or the legacy cidr_prefix, not both",
                ))
            }
            (None, None) => {
                return Err(SynthError::validation(
                    &field,
                    "none",
                    "one of subnet_prefix or cidr_prefix is required",
                ))
            }
            (Some(prefix), None) => {
                validate_prefix_range(&format!("{}.subnet_prefix", field), prefix, SUBNET_PREFIX_RANGE)?;
                prefix
            }
            (None, Some(extra_bits)) => {
                validate_prefix_range(&format!("{}.cidr_prefix", field), extra_bits, LEGACY_EXTRA_BITS_RANGE)?;
                log::warn!(
                    "Subnet '{}' uses the deprecated cidr_prefix form; resolved to /{}. Run with --migrate to rewrite it.",
                    request.name,
                    parent_prefix + extra_bits
                );
                let prefix = parent_prefix + extra_bits;
                validate_prefix_range(&format!("{}.cidr_prefix", field), prefix, SUBNET_PREFIX_RANGE)?;
                prefix
            }
        };

        if prefix_len <= parent_prefix {
            return Err(SynthError::validation(
                format!("{}.subnet_prefix", field),
                format!("/{}", prefix_len),
                format!("must be more specific than the parent /{}", parent_prefix),
            ));
        }

        let az_count = request.availability_zones.unwrap_or(network_az_count);
        if az_count == 0 {
            return Err(SynthError::validation(
                format!("{}.availability_zones", field),
                0,
                "must be at least 1",
            ));
        }
        if az_count > network_az_count {
            return Err(SynthError::configuration(
                field,
                format!(
                    "requests {} availability zones but the network only has {}",
                    az_count, network_az_count
                ),
            ));
        }

        Ok(Self {
            name: request.name.clone(),
            subnet_type: request.subnet_type,
            prefix_len,
            az_count,
        })
    }
}

/// Identity of a concrete subnet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubnetKey {
    pub name: String,
    pub az_index: usize,
}

impl SubnetKey {
    pub fn new(name: impl Into<String>, az_index: usize) -> Self {
        Self {
            name: name.into(),
            az_index,
        }
    }
}

impl fmt::Display for SubnetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.az_index)
    }
}

/// One carved subnet block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocatedSubnet {
    pub key: SubnetKey,
    pub subnet_type: SubnetType,
    pub block: AddressBlock,
    /// Position in the ledger, in units of the smallest subnet
    pub unit_offset: u64,
}

/// The full address plan of one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetLayout {
    pub parent: AddressBlock,
    /// Prefix length of one ledger unit
    pub unit_prefix: u8,
    pub units_total: u64,
    pub units_consumed: u64,
    pub subnets: Vec<AllocatedSubnet>,
}

impl SubnetLayout {
    pub fn get(&self, name: &str, az_index: usize) -> Option<&AllocatedSubnet> {
        self.subnets
            .iter()
            .find(|s| s.key.name == name && s.key.az_index == az_index)
    }

    /// Subnets of one type in allocation order
    pub fn of_type(&self, subnet_type: SubnetType) -> impl Iterator<Item = &AllocatedSubnet> {
        self.subnets.iter().filter(move |s| s.subnet_type == subnet_type)
    }

    pub fn has_type(&self, subnet_type: SubnetType) -> bool {
        self.of_type(subnet_type).next().is_some()
    }
}

/// Carve `parent` into one block per (spec, AZ index).
///
/// Fails on duplicate spec names, on a child prefix that is not more
/// specific than the parent, and when the parent runs out of space.
pub fn allocate(parent: &AddressBlock, specs: &[SubnetSpec]) -> Result<SubnetLayout, SynthError> {
    let mut names = HashSet::new();
    for spec in specs {
        if !names.insert(spec.name.as_str()) {
            return Err(SynthError::validation("subnets.name", &spec.name, "duplicate subnet name"));
        }
        if spec.prefix_len <= parent.prefix_len() || spec.prefix_len > 32 {
            return Err(SynthError::validation(
                format!("subnets[{}].subnet_prefix", spec.name),
                format!("/{}", spec.prefix_len),
                format!("must be more specific than the parent {}", parent),
            ));
        }
    }

    let unit_prefix = specs
        .iter()
        .map(|s| s.prefix_len)
        .max()
        .unwrap_or(parent.prefix_len());
    let units_total = 1u64 << (unit_prefix - parent.prefix_len());

    let mut cursor = 0u64;
    let mut subnets = Vec::new();

    for spec in specs {
        let block_units = 1u64 << (unit_prefix - spec.prefix_len);
        for az_index in 0..spec.az_count {
            cursor = cursor.div_ceil(block_units) * block_units;
            let index = cursor / block_units;
            let block = parent
                .nth_sub_block(spec.prefix_len, index)
                .map_err(|e| exhausted(parent, spec, az_index, e))?;

            log::debug!("Subnet {}-{} ({}) -> {}", spec.name, az_index, spec.subnet_type, block);
            subnets.push(AllocatedSubnet {
                key: SubnetKey::new(&spec.name, az_index),
                subnet_type: spec.subnet_type,
                block,
                unit_offset: cursor,
            });
            cursor += block_units;
        }
    }

    log::info!(
        "Allocated {} subnet(s) in {} using {}/{} /{} units",
        subnets.len(),
        parent,
        cursor,
        units_total,
        unit_prefix
    );

    Ok(SubnetLayout {
        parent: *parent,
        unit_prefix,
        units_total,
        units_consumed: cursor,
        subnets,
    })
}

fn exhausted(parent: &AddressBlock, spec: &SubnetSpec, az_index: usize, err: CidrError) -> SynthError {
    match err {
        CidrError::IndexOutOfRange { .. } => SynthError::configuration(
            format!("network block {}", parent),
            format!(
                "no room for subnet {}-{} (/{}): {}",
                spec.name, az_index, spec.prefix_len, err
            ),
        ),
        other => SynthError::from_cidr(format!("subnets[{}]", spec.name), &parent.to_string(), other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(text: &str) -> AddressBlock {
        AddressBlock::parse(text).unwrap()
    }

    fn spec(name: &str, subnet_type: SubnetType, prefix_len: u8, az_count: usize) -> SubnetSpec {
        SubnetSpec {
            name: name.to_string(),
            subnet_type,
            prefix_len,
            az_count,
        }
    }

    fn request(name: &str, subnet_prefix: Option<u8>, cidr_prefix: Option<u8>, az: Option<usize>) -> SubnetRequest {
        SubnetRequest {
            name: name.to_string(),
            subnet_type: SubnetType::Private,
            subnet_prefix,
            cidr_prefix,
            availability_zones: az,
        }
    }

    #[test]
    fn test_public_private_layout() {
        let layout = allocate(
            &parent("10.0.0.0/16"),
            &[
                spec("public", SubnetType::Public, 24, 2),
                spec("private", SubnetType::Private, 24, 2),
            ],
        )
        .unwrap();

        let blocks: Vec<String> = layout.subnets.iter().map(|s| s.block.to_string()).collect();
        assert_eq!(blocks, vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]);
        assert_eq!(layout.get("private", 1).unwrap().block.to_string(), "10.0.3.0/24");
        assert_eq!(layout.of_type(SubnetType::Public).count(), 2);
        assert!(!layout.has_type(SubnetType::Transit));
        assert_eq!(layout.units_consumed, 4);
        assert_eq!(layout.units_total, 256);
    }

    #[test]
    fn test_uniform_layout_is_disjoint_and_contained() {
        let parent = parent("10.20.0.0/16");
        let specs = vec![
            spec("public", SubnetType::Public, 22, 3),
            spec("private", SubnetType::Private, 22, 3),
            spec("transit", SubnetType::Transit, 22, 3),
        ];
        let layout = allocate(&parent, &specs).unwrap();
        assert_eq!(layout.subnets.len(), 9);

        for (i, a) in layout.subnets.iter().enumerate() {
            assert!(parent.contains(&a.block));
            assert_eq!(a.block, parent.nth_sub_block(22, i as u64).unwrap());
            for b in layout.subnets.iter().skip(i + 1) {
                assert!(!a.block.overlaps(&b.block), "{} overlaps {}", a.block, b.block);
            }
        }

        // Same inputs, same plan.
        assert_eq!(allocate(&parent, &specs).unwrap(), layout);
    }

    #[test]
    fn test_mixed_sizes_do_not_overlap() {
        // A single block-count offset would put private-0 at 10.0.1.0/24,
        // inside public-0's 10.0.0.0/20.
        let layout = allocate(
            &parent("10.0.0.0/16"),
            &[
                spec("public", SubnetType::Public, 20, 1),
                spec("private", SubnetType::Private, 24, 2),
                spec("transit", SubnetType::Transit, 20, 1),
            ],
        )
        .unwrap();

        let blocks: Vec<String> = layout.subnets.iter().map(|s| s.block.to_string()).collect();
        assert_eq!(
            blocks,
            vec!["10.0.0.0/20", "10.0.16.0/24", "10.0.17.0/24", "10.0.32.0/20"]
        );
        assert_eq!(layout.unit_prefix, 24);
        for (i, a) in layout.subnets.iter().enumerate() {
            for b in layout.subnets.iter().skip(i + 1) {
                assert!(!a.block.overlaps(&b.block));
            }
        }
    }

    #[test]
    fn test_exhaustion_is_configuration_error() {
        let err = allocate(&parent("10.0.0.0/24"), &[spec("private", SubnetType::Private, 26, 5)]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = allocate(
            &parent("10.0.0.0/16"),
            &[
                spec("app", SubnetType::Private, 24, 1),
                spec("app", SubnetType::Public, 24, 1),
            ],
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_resolve_canonical_and_legacy_sizing() {
        let canonical = SubnetSpec::resolve(&request("app", Some(24), None, None), 16, 3).unwrap();
        assert_eq!(canonical.prefix_len, 24);
        assert_eq!(canonical.az_count, 3);

        let legacy = SubnetSpec::resolve(&request("app", None, Some(8), Some(2)), 16, 3).unwrap();
        assert_eq!(legacy.prefix_len, 24);
        assert_eq!(legacy.az_count, 2);
    }

    #[test]
    fn test_resolve_errors() {
        let both = SubnetSpec::resolve(&request("app", Some(24), Some(8), None), 16, 2).unwrap_err();
        assert!(both.is_validation());

        let neither = SubnetSpec::resolve(&request("app", None, None, None), 16, 2).unwrap_err();
        assert!(neither.is_validation());

        let out_of_range = SubnetSpec::resolve(&request("app", Some(31), None, None), 16, 2).unwrap_err();
        assert!(out_of_range.is_validation());

        let not_specific = SubnetSpec::resolve(&request("app", Some(16), None, None), 16, 2).unwrap_err();
        assert!(not_specific.is_validation());

        let legacy_too_deep = SubnetSpec::resolve(&request("app", None, Some(16), None), 20, 2).unwrap_err();
        assert!(legacy_too_deep.is_validation());

        let zero_az = SubnetSpec::resolve(&request("app", Some(24), None, Some(0)), 16, 2).unwrap_err();
        assert!(zero_az.is_validation());

        let too_many_az = SubnetSpec::resolve(&request("app", Some(24), None, Some(3)), 16, 2).unwrap_err();
        assert!(too_many_az.is_configuration());
    }
}
