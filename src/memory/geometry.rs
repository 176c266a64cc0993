/*!
 * Megablock Geometry
 * Block, megablock and descriptor sizing plus the address arithmetic built on it
 *
 * ```text
 *  megablock base                                      base + megablock_size
 *  |                                                                       |
 *  +-------+--------------------+-------------+-------------+-----+--------+
 *  | (pad) | descriptors        | block 0     | block 1     | ... | block  |
 *  |       | d0 d1 ... d(n-1)   |             |             |     | n-1    |
 *  +-------+--------------------+-------------+-------------+-----+--------+
 *          ^                    ^
 *          first_descriptor     first_block
 * ```
 *
 * Descriptor `i` describes the block group starting at block `i`. The slot for
 * a block at byte offset `off` within its megablock is `(off / block_size) *
 * descriptor_size`, so descriptors start at `first_descriptor_offset`.
 */

use crate::core::limits::{DEFAULT_BLOCK_SIZE, DEFAULT_DESCRIPTOR_SIZE, DEFAULT_MEGABLOCK_SIZE};
use crate::core::types::{Address, BlockCount, MegablockCount};
use crate::core::{AllocError, AllocResult};
use serde::{Deserialize, Serialize};

/// Smallest descriptor able to hold start, free, link and block count
const MIN_DESCRIPTOR_SIZE: u64 = 32;

/// Raw sizing parameters, the serialized form of [`Geometry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryParams {
    pub block_size: u64,
    pub megablock_size: u64,
    pub descriptor_size: u64,
}

/// Validated geometry constants. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GeometryParams", into = "GeometryParams")]
pub struct Geometry {
    block_size: u64,
    megablock_size: u64,
    descriptor_size: u64,
    blocks_per_megablock: u32,
    first_descriptor_offset: u64,
    first_block_offset: u64,
}

impl Geometry {
    /// Build a geometry, deriving descriptor and block offsets.
    ///
    /// The descriptor area is sized for every block-sized slot of the
    /// megablock and rounded up to a whole number of blocks, so the first
    /// usable block is always block aligned.
    pub fn new(block_size: u64, megablock_size: u64, descriptor_size: u64) -> AllocResult<Self> {
        if !block_size.is_power_of_two() || !megablock_size.is_power_of_two() {
            return Err(AllocError::configuration(format!(
                "block size {} and megablock size {} must be powers of two",
                block_size, megablock_size
            )));
        }
        if megablock_size <= block_size {
            return Err(AllocError::configuration(format!(
                "megablock size {} must be a larger multiple of block size {}",
                megablock_size, block_size
            )));
        }
        if descriptor_size < MIN_DESCRIPTOR_SIZE || descriptor_size % 8 != 0 {
            return Err(AllocError::configuration(format!(
                "descriptor size {} must be a multiple of 8 and at least {}",
                descriptor_size, MIN_DESCRIPTOR_SIZE
            )));
        }

        let slots = megablock_size / block_size;
        let first_block_offset = descriptor_size
            .checked_mul(slots)
            .and_then(|area| area.div_ceil(block_size).checked_mul(block_size))
            .ok_or_else(|| {
                AllocError::configuration(format!(
                    "descriptor area of {} slots of {} bytes overflows the address space",
                    slots, descriptor_size
                ))
            })?;
        let descriptor_area = descriptor_size * slots;
        if first_block_offset >= megablock_size {
            return Err(AllocError::configuration(format!(
                "descriptor area of {} bytes leaves no room for blocks in a {} byte megablock",
                descriptor_area, megablock_size
            )));
        }

        let blocks_per_megablock = (megablock_size - first_block_offset) / block_size;
        let blocks_per_megablock = u32::try_from(blocks_per_megablock).map_err(|_| {
            AllocError::configuration(format!(
                "{} blocks per megablock does not fit a descriptor",
                blocks_per_megablock
            ))
        })?;
        let first_descriptor_offset = (first_block_offset / block_size) * descriptor_size;

        let geometry = Self {
            block_size,
            megablock_size,
            descriptor_size,
            blocks_per_megablock,
            first_descriptor_offset,
            first_block_offset,
        };
        debug_assert!(
            geometry.first_block_offset
                >= geometry.first_descriptor_offset
                    + u64::from(geometry.blocks_per_megablock) * geometry.descriptor_size
        );
        Ok(geometry)
    }

    #[inline]
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    #[inline]
    pub const fn megablock_size(&self) -> u64 {
        self.megablock_size
    }

    #[inline]
    pub const fn descriptor_size(&self) -> u64 {
        self.descriptor_size
    }

    #[inline]
    pub const fn blocks_per_megablock(&self) -> BlockCount {
        BlockCount(self.blocks_per_megablock)
    }

    #[inline]
    pub const fn first_descriptor_offset(&self) -> u64 {
        self.first_descriptor_offset
    }

    #[inline]
    pub const fn first_block_offset(&self) -> u64 {
        self.first_block_offset
    }

    /// Bytes spanned by `blocks` blocks
    #[inline]
    pub fn blocks_to_bytes(&self, blocks: BlockCount) -> u64 {
        u64::from(blocks.get()) * self.block_size
    }

    /// Whole blocks contained in `bytes`
    #[inline]
    pub fn bytes_to_blocks(&self, bytes: u64) -> BlockCount {
        BlockCount((bytes / self.block_size) as u32)
    }

    /// Megablocks needed to hold a group of `blocks` blocks
    pub fn megablocks_for(&self, blocks: BlockCount) -> MegablockCount {
        MegablockCount(blocks.get().div_ceil(self.blocks_per_megablock))
    }

    /// Bytes spanned by `count` megablocks
    #[inline]
    pub fn megablocks_to_bytes(&self, count: MegablockCount) -> u64 {
        u64::from(count.get()) * self.megablock_size
    }

    /// Base address of the megablock containing `addr`
    #[inline]
    pub fn megablock_of(&self, addr: Address) -> Address {
        Address(addr.get() & !(self.megablock_size - 1))
    }

    /// Megablock index of `addr` counted from address zero
    #[inline]
    pub fn megablock_index(&self, addr: Address) -> u64 {
        addr.get() / self.megablock_size
    }

    #[inline]
    pub fn is_block_aligned(&self, addr: Address) -> bool {
        addr.is_aligned_to(self.block_size)
    }

    #[inline]
    pub fn is_megablock_aligned(&self, addr: Address) -> bool {
        addr.is_aligned_to(self.megablock_size)
    }

    /// First descriptor slot of the megablock at `megablock`
    #[inline]
    pub fn first_descriptor(&self, megablock: Address) -> Address {
        megablock + self.first_descriptor_offset
    }

    /// First allocatable block of the megablock at `megablock`
    #[inline]
    pub fn first_block(&self, megablock: Address) -> Address {
        megablock + self.first_block_offset
    }

    /// Half-open block area `[first_block, end)` of the megablock at `megablock`
    pub fn allocatable_range(&self, megablock: Address) -> (Address, Address) {
        let low = self.first_block(megablock);
        (low, low + self.blocks_to_bytes(self.blocks_per_megablock()))
    }

    /// Descriptor slot describing the group that starts at `block`
    pub fn descriptor_for(&self, block: Address) -> Address {
        let megablock = self.megablock_of(block);
        let offset = block.get() - megablock.get();
        megablock + (offset / self.block_size) * self.descriptor_size
    }

    /// First block described by the descriptor slot at `descriptor`
    pub fn block_for(&self, descriptor: Address) -> Address {
        let megablock = self.megablock_of(descriptor);
        let offset = descriptor.get() - megablock.get();
        megablock + (offset / self.descriptor_size) * self.block_size
    }

    /// Whether `addr` is exactly one of the descriptor slots of its megablock
    pub fn is_descriptor_slot(&self, addr: Address) -> bool {
        let offset = addr.get() - self.megablock_of(addr).get();
        let area_end = self.first_descriptor_offset
            + u64::from(self.blocks_per_megablock) * self.descriptor_size;
        offset >= self.first_descriptor_offset
            && offset < area_end
            && (offset - self.first_descriptor_offset) % self.descriptor_size == 0
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            megablock_size: DEFAULT_MEGABLOCK_SIZE,
            descriptor_size: DEFAULT_DESCRIPTOR_SIZE,
            // 1MB / 4KB = 256 slots, 256 * 64 = 16KB of descriptors = 4 blocks
            blocks_per_megablock: 252,
            first_descriptor_offset: 256,
            first_block_offset: 16 * 1024,
        }
    }
}

impl TryFrom<GeometryParams> for Geometry {
    type Error = AllocError;

    fn try_from(params: GeometryParams) -> AllocResult<Self> {
        Geometry::new(
            params.block_size,
            params.megablock_size,
            params.descriptor_size,
        )
    }
}

impl From<Geometry> for GeometryParams {
    fn from(geometry: Geometry) -> Self {
        Self {
            block_size: geometry.block_size,
            megablock_size: geometry.megablock_size,
            descriptor_size: geometry.descriptor_size,
        }
    }
}
