/*!
 * Block Descriptor Layout
 * Fixed-layout records stored in each megablock's descriptor area
 */

use super::resource::MemoryResource;
use crate::core::types::{Address, BlockCount};
use crate::core::ResourceError;
use serde::{Deserialize, Serialize};

/// Byte offset of `start` within a descriptor
pub const OFFSET_START: u64 = 0;
/// Byte offset of `free` within a descriptor
pub const OFFSET_FREE: u64 = 8;
/// Byte offset of `link` within a descriptor
pub const OFFSET_LINK: u64 = 16;
/// Byte offset of `blocks` within a descriptor
pub const OFFSET_BLOCKS: u64 = 24;

/// In-memory copy of a block descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// First byte of the group's memory
    pub start: Address,
    /// Allocation cursor of the heap layered on top
    pub free: Address,
    /// Related descriptor, or null
    pub link: Address,
    pub blocks: BlockCount,
}

impl BlockDescriptor {
    /// Fresh descriptor for a group of `blocks` blocks at `start`
    pub fn fresh(start: Address, blocks: BlockCount) -> Self {
        Self {
            start,
            free: start,
            link: Address::NULL,
            blocks,
        }
    }

    pub fn read<M: MemoryResource + ?Sized>(
        memory: &M,
        at: Address,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            start: Address(memory.load_i64(at + OFFSET_START)? as u64),
            free: Address(memory.load_i64(at + OFFSET_FREE)? as u64),
            link: Address(memory.load_i64(at + OFFSET_LINK)? as u64),
            blocks: BlockCount(memory.load_i32(at + OFFSET_BLOCKS)? as u32),
        })
    }

    pub fn write<M: MemoryResource + ?Sized>(
        &self,
        memory: &mut M,
        at: Address,
    ) -> Result<(), ResourceError> {
        memory.store_i64(at + OFFSET_START, self.start.get() as i64)?;
        memory.store_i64(at + OFFSET_FREE, self.free.get() as i64)?;
        memory.store_i64(at + OFFSET_LINK, self.link.get() as i64)?;
        memory.store_i32(at + OFFSET_BLOCKS, self.blocks.get() as i32)
    }
}
