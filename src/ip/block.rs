//! IPv4 address block arithmetic.
//!
//! An `AddressBlock` is a prefix-aligned IPv4 network (`10.0.0.0/16`). All
//! operations here are pure: the same inputs always produce the same block,
//! which keeps address plans reproducible across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Errors from parsing or carving address blocks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidrError {
    #[error("malformed CIDR '{0}', expected a.b.c.d/len")]
    Malformed(String),

    #[error("octet {octet} in '{text}' is outside 0-255")]
    OctetOutOfRange { text: String, octet: String },

    #[error("prefix length {prefix} in '{text}' is outside 0-32")]
    PrefixOutOfRange { text: String, prefix: String },

    #[error("'{text}' has host bits set (network address is {expected})")]
    Misaligned { text: String, expected: String },

    #[error("child prefix /{child_prefix} is not more specific than {parent}")]
    NotMoreSpecific { parent: AddressBlock, child_prefix: u8 },

    #[error("block index {index} exceeds the {capacity} /{child_prefix} blocks available in {parent}")]
    IndexOutOfRange {
        parent: AddressBlock,
        child_prefix: u8,
        index: u64,
        capacity: u64,
    },
}

/// A prefix-aligned IPv4 network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock {
    base: u32,
    prefix_len: u8,
}

impl AddressBlock {
    /// Build a block from a base address and prefix length, rejecting set host bits
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, CidrError> {
        if prefix_len > 32 {
            return Err(CidrError::PrefixOutOfRange {
                text: format!("{}/{}", base, prefix_len),
                prefix: prefix_len.to_string(),
            });
        }
        let raw = u32::from(base);
        let aligned = raw & mask(prefix_len);
        if aligned != raw {
            return Err(CidrError::Misaligned {
                text: format!("{}/{}", base, prefix_len),
                expected: format!("{}/{}", Ipv4Addr::from(aligned), prefix_len),
            });
        }
        Ok(Self { base: raw, prefix_len })
    }

    /// Parse `a.b.c.d/len` text
    pub fn parse(text: &str) -> Result<Self, CidrError> {
        let trimmed = text.trim();
        let (addr, prefix) = trimmed
            .split_once('/')
            .ok_or_else(|| CidrError::Malformed(text.to_string()))?;

        let octets: Vec<&str> = addr.split('.').collect();
        if octets.len() != 4 {
            return Err(CidrError::Malformed(text.to_string()));
        }

        let mut bytes = [0u8; 4];
        for (slot, octet) in bytes.iter_mut().zip(&octets) {
            if octet.is_empty() || !octet.chars().all(|c| c.is_ascii_digit()) {
                return Err(CidrError::Malformed(text.to_string()));
            }
            *slot = octet.parse::<u8>().map_err(|_| CidrError::OctetOutOfRange {
                text: text.to_string(),
                octet: octet.to_string(),
            })?;
        }

        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(CidrError::Malformed(text.to_string()));
        }
        let prefix_len = match prefix.parse::<u8>() {
            Ok(len) if len <= 32 => len,
            _ => {
                return Err(CidrError::PrefixOutOfRange {
                    text: text.to_string(),
                    prefix: prefix.to_string(),
                })
            }
        };

        Self::new(Ipv4Addr::from(bytes), prefix_len)
    }

    pub fn base(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.base)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of addresses covered by the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len as u32)
    }

    /// Last address in the block
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from((self.base as u64 + self.size() - 1) as u32)
    }

    /// True when `child` lies entirely inside `self`
    pub fn contains(&self, child: &AddressBlock) -> bool {
        child.prefix_len >= self.prefix_len && child.base & mask(self.prefix_len) == self.base
    }

    /// True when the two blocks share at least one address
    pub fn overlaps(&self, other: &AddressBlock) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// How many `/child_prefix` blocks fit in `self`
    pub fn capacity(&self, child_prefix: u8) -> Result<u64, CidrError> {
        if child_prefix <= self.prefix_len || child_prefix > 32 {
            return Err(CidrError::NotMoreSpecific {
                parent: *self,
                child_prefix,
            });
        }
        Ok(1u64 << (child_prefix - self.prefix_len))
    }

    /// The `index`-th `/child_prefix` block inside `self`.
    ///
    /// `child_base = parent_base + index * 2^(32 - child_prefix)`.
    pub fn nth_sub_block(&self, child_prefix: u8, index: u64) -> Result<AddressBlock, CidrError> {
        let capacity = self.capacity(child_prefix)?;
        if index >= capacity {
            return Err(CidrError::IndexOutOfRange {
                parent: *self,
                child_prefix,
                index,
                capacity,
            });
        }
        let step = 1u64 << (32 - child_prefix as u32);
        let base = self.base as u64 + index * step;
        Ok(AddressBlock {
            base: base as u32,
            prefix_len: child_prefix,
        })
    }
}

fn mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base(), self.prefix_len)
    }
}

impl FromStr for AddressBlock {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = CidrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.to_string()
    }
}
