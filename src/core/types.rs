/*!
 * Core Types
 * Address and count newtypes used across the allocator
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Byte address inside the growable linear memory.
///
/// Kept distinct from [`BlockCount`] and [`MegablockCount`] so that a count can
/// never be used where a byte offset is expected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    /// The null sentinel stored in descriptor links
    pub const NULL: Address = Address(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Bytes from `earlier` up to `self`, or `None` if `earlier` is higher
    #[inline]
    pub fn offset_from(self, earlier: Address) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    #[inline]
    pub const fn is_aligned_to(self, alignment: u64) -> bool {
        self.0 % alignment == 0
    }
}

impl Add<u64> for Address {
    type Output = Address;

    #[inline]
    fn add(self, bytes: u64) -> Address {
        Address(self.0 + bytes)
    }
}

impl Sub<u64> for Address {
    type Output = Address;

    #[inline]
    fn sub(self, bytes: u64) -> Address {
        Address(self.0 - bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Number of blocks in a block group
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockCount(pub u32);

impl BlockCount {
    #[inline]
    pub const fn new(blocks: u32) -> Self {
        Self(blocks)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocks", self.0)
    }
}

/// Number of megablocks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MegablockCount(pub u32);

impl MegablockCount {
    #[inline]
    pub const fn new(megablocks: u32) -> Self {
        Self(megablocks)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MegablockCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} megablocks", self.0)
    }
}
