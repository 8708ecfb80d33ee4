//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the allocator's slot table (1-based, 0 is reserved)
//! - A generation counter for detecting stale references
//!
//! A handle is a capability token, not a reference. Holding one never keeps
//! anything alive; asking the registry about a retired handle answers "absent".

use std::cmp::Ordering;
use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Number of bits available to the generation counter.
///
/// The slot table stores the generation next to a "free" flag in a `u32`,
/// which leaves 31 bits for the counter itself.
pub const GENERATION_BITS: u32 = 31;

/// Largest generation a slot can reach before its index is parked.
pub const MAX_GENERATION: u32 = (1 << GENERATION_BITS) - 1;

/// Packed entity handle.
///
/// The handle is one machine word:
/// - Lower 32 bits: index (1-based; 0 means invalid)
/// - Upper 32 bits: generation (only the low 31 bits are ever used)
///
/// Ordering is lexicographic on `(index, generation)` so handles sort by
/// index in ordered containers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// The reserved "no entity" sentinel (index 0, generation 0).
    pub const INVALID: Self = Self(0);

    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks whether this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.index() == 0
    }

    /// Packs the handle into a `u64` (for networking/save files).
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`Entity::to_bits`] output.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index()
            .cmp(&other.index())
            .then_with(|| self.generation().cmp(&other.generation()))
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("Entity(INVALID)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.index(), self.generation())
    }
}
