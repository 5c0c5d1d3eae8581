//! Address pool management.
//!
//! A pool owns a set of non-overlapping parent blocks and one regional
//! handle per operating region. Networks that draw their parent block from
//! a pool are served by a per-pool allocation ledger, so blocks handed to
//! different regions of the same pool never overlap.

use crate::backend::OrganizationSharing;
use crate::error::SynthError;
use crate::ip::block::AddressBlock;
use crate::utils::validation::{validate_name, validate_prefix_range, validate_region, POOL_PREFIX_RANGE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

/// Sharing scope used when a pool is offered to the whole organization
pub const ORGANIZATION_SCOPE: &str = "organization";

/// Requested shape of a pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSpec {
    pub name: String,
    pub cidrs: Vec<String>,
    pub operating_regions: Vec<String>,
    #[serde(default)]
    pub share_with_organization: bool,
}

/// Region-scoped view of a pool
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegionalPoolHandle {
    pub id: String,
    pub pool: String,
    pub region: String,
    pub blocks: Vec<AddressBlock>,
}

/// A validated pool with its regional handles
#[derive(Debug, Clone, Serialize)]
pub struct AddressPool {
    pub name: String,
    pub id: String,
    pub blocks: Vec<AddressBlock>,
    pub share_with_organization: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    regional: BTreeMap<String, RegionalPoolHandle>,
}

/// A block handed out of a pool to one network
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolAllocation {
    pub pool: String,
    pub region: String,
    pub owner: String,
    pub block: AddressBlock,
}

impl AddressPool {
    /// Validate a pool spec and materialize one handle per operating region.
    ///
    /// Rejects an empty block list, malformed blocks, prefix lengths outside
    /// 8-28, duplicate or overlapping blocks, an empty region list, duplicate
    /// regions, and region names that fail the format check.
    pub fn create(spec: &PoolSpec) -> Result<Self, SynthError> {
        validate_name("pools.name", &spec.name)?;
        let field = format!("pools[{}].cidrs", spec.name);

        if spec.cidrs.is_empty() {
            return Err(SynthError::validation(&field, "[]", "a pool needs at least one CIDR block"));
        }

        let mut blocks: Vec<AddressBlock> = Vec::with_capacity(spec.cidrs.len());
        for text in &spec.cidrs {
            let block = AddressBlock::parse(text).map_err(|e| SynthError::from_cidr(&field, text, e))?;
            validate_prefix_range(&field, block.prefix_len(), POOL_PREFIX_RANGE)?;

            if let Some(existing) = blocks.iter().find(|b| b.overlaps(&block)) {
                let constraint = if *existing == block {
                    "duplicate block".to_string()
                } else {
                    format!("overlaps {}", existing)
                };
                return Err(SynthError::validation(&field, text, constraint));
            }
            blocks.push(block);
        }

        let regions_field = format!("pools[{}].operating_regions", spec.name);
        if spec.operating_regions.is_empty() {
            return Err(SynthError::validation(
                &regions_field,
                "[]",
                "a pool needs at least one operating region",
            ));
        }
        let mut seen = HashSet::new();
        for region in &spec.operating_regions {
            validate_region(&regions_field, region)?;
            if !seen.insert(region.as_str()) {
                return Err(SynthError::validation(&regions_field, region, "duplicate region"));
            }
        }

        let id = format!("ipam-pool-{}", spec.name);

        // Regions share nothing mutable, so each handle is materialized independently.
        let regional: BTreeMap<String, RegionalPoolHandle> = spec
            .operating_regions
            .par_iter()
            .map(|region| {
                let handle = RegionalPoolHandle {
                    id: format!("{}-{}", id, region),
                    pool: spec.name.clone(),
                    region: region.clone(),
                    blocks: blocks.clone(),
                };
                (region.clone(), handle)
            })
            .collect();

        log::info!(
            "Created pool {} with {} block(s) across {} region(s)",
            spec.name,
            blocks.len(),
            regional.len()
        );

        Ok(Self {
            name: spec.name.clone(),
            id,
            blocks,
            share_with_organization: spec.share_with_organization,
            share_id: None,
            regional,
        })
    }

    /// Handle for one operating region
    pub fn regional_handle(&self, region: &str) -> Result<&RegionalPoolHandle, SynthError> {
        self.regional
            .get(region)
            .ok_or_else(|| SynthError::not_found("pool region", format!("{}/{}", self.name, region)))
    }

    /// All regional handles, ordered by region name
    pub fn regional_handles(&self) -> impl Iterator<Item = &RegionalPoolHandle> {
        self.regional.values()
    }

    /// Register the pool for organization-wide discovery when requested
    pub fn share(&mut self, sharing: &dyn OrganizationSharing) -> Result<Option<&str>, SynthError> {
        if !self.share_with_organization {
            return Ok(None);
        }
        if self.share_id.is_none() {
            let share_id = sharing.share_resource(&self.id, ORGANIZATION_SCOPE)?;
            log::info!("Shared pool {} with the organization as {}", self.name, share_id);
            self.share_id = Some(share_id);
        }
        Ok(self.share_id.as_deref())
    }
}

/// Owns every pool and the ledger of blocks handed out of them
#[derive(Debug, Default)]
pub struct AddressPoolManager {
    pools: BTreeMap<String, AddressPool>,
    allocations: BTreeMap<String, Vec<PoolAllocation>>,
}

impl AddressPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a pool
    pub fn create_pool(&mut self, spec: &PoolSpec) -> Result<&AddressPool, SynthError> {
        if self.pools.contains_key(&spec.name) {
            return Err(SynthError::validation("pools.name", &spec.name, "duplicate pool name"));
        }
        let pool = AddressPool::create(spec)?;
        self.allocations.insert(pool.name.clone(), Vec::new());
        Ok(self.pools.entry(pool.name.clone()).or_insert(pool))
    }

    pub fn pool(&self, name: &str) -> Result<&AddressPool, SynthError> {
        self.pools.get(name).ok_or_else(|| SynthError::not_found("pool", name))
    }

    pub fn pools(&self) -> impl Iterator<Item = &AddressPool> {
        self.pools.values()
    }

    pub fn regional_handle(&self, pool: &str, region: &str) -> Result<&RegionalPoolHandle, SynthError> {
        self.pool(pool)?.regional_handle(region)
    }

    /// Blocks already handed out of a pool, in allocation order
    pub fn allocations(&self, pool: &str) -> &[PoolAllocation] {
        self.allocations.get(pool).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Share every pool that asked for organization-wide visibility
    pub fn share_pools(&mut self, sharing: &dyn OrganizationSharing) -> Result<Vec<(String, String)>, SynthError> {
        let mut shared = Vec::new();
        for pool in self.pools.values_mut() {
            let name = pool.name.clone();
            if let Some(share_id) = pool.share(sharing)? {
                shared.push((name, share_id.to_string()));
            }
        }
        Ok(shared)
    }

    /// Hand the lowest aligned free `/netmask_length` block of a pool to `owner`.
    ///
    /// Blocks are scanned in declaration order. The ledger is per pool, not
    /// per region, so no two regions ever receive overlapping space.
    pub fn allocate(
        &mut self,
        pool: &str,
        region: &str,
        netmask_length: u8,
        owner: &str,
    ) -> Result<AddressBlock, SynthError> {
        let handle = self.regional_handle(pool, region)?;
        let context = format!("pool {} ({})", pool, handle.id);
        if netmask_length > 32 {
            return Err(SynthError::validation("netmask_length", netmask_length, "must be at most 32"));
        }

        let allocated = self.allocations(pool);
        let mut chosen = None;
        for block in &handle.blocks {
            if netmask_length < block.prefix_len() {
                continue;
            }
            if let Some(candidate) = first_free(block, netmask_length, allocated)? {
                chosen = Some(candidate);
                break;
            }
        }

        let block = chosen.ok_or_else(|| {
            SynthError::configuration(&context, format!("no free /{} block left for {}", netmask_length, owner))
        })?;

        log::info!("Allocated {} from pool {} to {} in {}", block, pool, owner, region);
        self.allocations.entry(pool.to_string()).or_default().push(PoolAllocation {
            pool: pool.to_string(),
            region: region.to_string(),
            owner: owner.to_string(),
            block,
        });
        Ok(block)
    }
}

/// Lowest `/netmask_length` block inside `parent` that overlaps nothing in `allocated`
fn first_free(
    parent: &AddressBlock,
    netmask_length: u8,
    allocated: &[PoolAllocation],
) -> Result<Option<AddressBlock>, SynthError> {
    let step = 1u64 << (32 - netmask_length as u32);
    let parent_base = u32::from(parent.base()) as u64;
    let mut offset = 0u64;

    while offset + step <= parent.size() {
        let candidate = AddressBlock::new(Ipv4Addr::from((parent_base + offset) as u32), netmask_length)
            .map_err(|e| SynthError::configuration(format!("pool block {}", parent), e.to_string()))?;

        match allocated.iter().find(|a| a.block.overlaps(&candidate)) {
            None => return Ok(Some(candidate)),
            Some(taken) => {
                // Skip past the conflicting allocation, staying aligned to our size.
                let taken_end = u32::from(taken.block.base()) as u64 + taken.block.size() - parent_base;
                let next = taken_end.max(offset + step);
                offset = next.div_ceil(step) * step;
            }
        }
    }
    Ok(None)
}
