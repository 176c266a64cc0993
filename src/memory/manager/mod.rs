/*!
 * Block/Megablock Allocator
 *
 * Two-level allocator carving a growable linear memory into megablocks and
 * megablocks into block groups for a garbage-collected heap.
 *
 * ## Allocation
 *
 * - **Small groups** (fewer blocks than fit in a megablock): first-fit over the
 *   free list, carving from the low end of the first interval large enough.
 *   With no fit, a fresh megablock is committed and its tail goes on the
 *   free list.
 * - **Large groups**: always a fresh run of contiguous megablocks, described
 *   by the first megablock's first descriptor.
 *
 * ## Growth
 *
 * The backing memory grows by `max(n, capacity)` megablocks, doubling the
 * capacity so the number of grow calls stays logarithmic.
 *
 * ## Reclamation
 *
 * After each collection the collector passes the live descriptors. Everything
 * else inside block-group megablocks is freed and the free list coalesced.
 * Megablocks obtained through [`BlockAllocator::grow_megablocks`] belong to
 * the caller and are never swept.
 */

mod allocator;
pub mod free_list;
mod gc;
mod megablocks;
pub mod pool;

pub use free_list::{FreeList, Interval};
pub use pool::MegablockPool;

use super::config::AllocatorConfig;
use super::descriptor::BlockDescriptor;
use super::geometry::Geometry;
use super::resource::MemoryResource;
use super::traits::BlockGroupAllocator;
use super::types::{AllocatorStats, ReclaimStats};
use crate::core::types::{Address, BlockCount, MegablockCount};
use crate::core::{AllocError, AllocResult};
use log::info;
use std::collections::BTreeMap;

/// Block/megablock allocator over a growable memory `M`
#[derive(Debug)]
pub struct BlockAllocator<M: MemoryResource> {
    memory: M,
    config: AllocatorConfig,
    /// Megablocks backed by memory
    capacity: MegablockCount,
    /// Megablocks committed, growing from the reserved boundary
    size: MegablockCount,
    reserved: MegablockCount,
    free_list: FreeList,
    pool: MegablockPool,
    /// Megablocks owned by block groups: run base -> megablocks in the run.
    /// Runs longer than one hold a single large group.
    heap: BTreeMap<Address, MegablockCount>,
}

impl<M: MemoryResource> BlockAllocator<M> {
    /// Take ownership of `memory`, treating the first `reserved` megablocks
    /// as static data that is never handed out.
    pub fn init(memory: M, reserved: MegablockCount, config: AllocatorConfig) -> AllocResult<Self> {
        let geometry = config.geometry;
        let megablock_size = geometry.megablock_size();
        let page_size = memory.page_size();

        if page_size == 0 || megablock_size % page_size != 0 {
            return Err(AllocError::configuration(format!(
                "megablock size {} is not a multiple of the {} byte page",
                megablock_size, page_size
            )));
        }

        let current = memory.current_size();
        if current % megablock_size != 0 {
            return Err(AllocError::configuration(format!(
                "memory size {} is not a multiple of the {} byte megablock",
                current, megablock_size
            )));
        }

        let capacity = u32::try_from(current / megablock_size)
            .map(MegablockCount)
            .map_err(|_| AllocError::configuration("memory holds too many megablocks"))?;
        if reserved > capacity {
            return Err(AllocError::configuration(format!(
                "{} reserved but memory only holds {}",
                reserved, capacity
            )));
        }

        info!(
            "Block allocator initialized: {} capacity, {} reserved, {} blocks per megablock",
            capacity,
            reserved,
            geometry.blocks_per_megablock().get()
        );

        Ok(Self {
            memory,
            config,
            capacity,
            size: reserved,
            reserved,
            free_list: FreeList::new(),
            pool: MegablockPool::new(),
            heap: BTreeMap::new(),
        })
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.config.geometry
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn capacity(&self) -> MegablockCount {
        self.capacity
    }

    pub fn size(&self) -> MegablockCount {
        self.size
    }

    pub fn reserved(&self) -> MegablockCount {
        self.reserved
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Mutable access to the backing memory, for the heap layered on top
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    pub fn pool(&self) -> &MegablockPool {
        &self.pool
    }

    /// Block-group megablock runs in address order
    pub fn heap_runs(&self) -> impl Iterator<Item = (Address, MegablockCount)> + '_ {
        self.heap.iter().map(|(a, c)| (*a, *c))
    }

    /// Read the descriptor stored at `descriptor`
    pub fn descriptor(&self, descriptor: Address) -> AllocResult<BlockDescriptor> {
        Ok(BlockDescriptor::read(&self.memory, descriptor)?)
    }

    pub fn stats(&self) -> AllocatorStats {
        let geometry = self.geometry();
        AllocatorStats {
            capacity: self.capacity,
            size: self.size,
            reserved: self.reserved,
            heap_megablocks: self.heap.values().map(|c| c.get() as usize).sum(),
            free_intervals: self.free_list.len(),
            free_blocks: self.free_list.total_bytes() / geometry.block_size(),
            pooled_megablocks: self.pool.megablocks(),
        }
    }

    /// Give back the backing memory
    pub fn into_memory(self) -> M {
        self.memory
    }

    /// Write a fresh descriptor for `blocks` blocks starting at `start`
    fn init_descriptor(&mut self, start: Address, blocks: BlockCount) -> AllocResult<Address> {
        let descriptor = self.geometry().descriptor_for(start);
        BlockDescriptor::fresh(start, blocks).write(&mut self.memory, descriptor)?;
        Ok(descriptor)
    }
}

impl<M: MemoryResource> BlockGroupAllocator for BlockAllocator<M> {
    fn allocate_block_group(&mut self, blocks: BlockCount) -> AllocResult<Address> {
        BlockAllocator::allocate_block_group(self, blocks)
    }

    fn reclaim_unreachable(&mut self, live: &[Address]) -> AllocResult<ReclaimStats> {
        BlockAllocator::reclaim_unreachable(self, live.iter().copied())
    }

    fn grow_megablocks(&mut self, count: MegablockCount) -> AllocResult<Address> {
        BlockAllocator::grow_megablocks(self, count)
    }
}
