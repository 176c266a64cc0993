/*!
 * Block Group Allocation
 * Allocation, freeing and coalescing of block groups
 */

use super::free_list::Interval;
use super::BlockAllocator;
use crate::core::types::{Address, BlockCount, MegablockCount};
use crate::core::{AllocError, AllocResult};
use crate::memory::resource::MemoryResource;
use log::{debug, info, warn};

impl<M: MemoryResource> BlockAllocator<M> {
    /// Allocate a group of `blocks` contiguous blocks, returning its descriptor.
    ///
    /// Groups of at least a megablock's worth of blocks always come from fresh
    /// megablocks. Smaller groups are carved first-fit from the free list,
    /// falling back to a new megablock whose tail becomes a free interval.
    pub fn allocate_block_group(&mut self, blocks: BlockCount) -> AllocResult<Address> {
        if blocks.get() == 0 {
            return Err(AllocError::invalid_request("zero blocks requested"));
        }

        let geometry = self.config.geometry;
        let per_megablock = geometry.blocks_per_megablock();

        if blocks >= per_megablock {
            let megablocks = geometry.megablocks_for(blocks);
            let base = self.acquire_megablocks(megablocks)?;
            let descriptor = self.init_descriptor(geometry.first_block(base), blocks)?;
            debug!(
                "Allocated large group of {} over {} at {} (descriptor {})",
                blocks, megablocks, base, descriptor
            );
            return Ok(descriptor);
        }

        let bytes = geometry.blocks_to_bytes(blocks);
        if let Some(index) = self.free_list.first_fit(bytes) {
            // A failed descriptor write must leave the interval on the list
            let start = self.free_list.as_slice()[index].low;
            let descriptor = self.init_descriptor(start, blocks)?;
            self.free_list.carve(index, bytes);
            debug!(
                "Recycled {} at {} from the free list (descriptor {})",
                blocks, start, descriptor
            );
            return Ok(descriptor);
        }

        let base = self.acquire_megablocks(MegablockCount(1))?;
        let (start, end) = geometry.allocatable_range(base);
        let descriptor = match self.init_descriptor(start, blocks) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.free_list.push(Interval::new(start, end));
                return Err(e);
            }
        };
        self.free_list.push(Interval::new(start + bytes, end));
        debug!(
            "Allocated {} at {} from a fresh megablock, {} left free",
            blocks,
            start,
            BlockCount(per_megablock.get() - blocks.get())
        );
        Ok(descriptor)
    }

    /// Return `[low, high)` to the free list and coalesce.
    ///
    /// The range must be block aligned, lie within one block-group megablock's
    /// block area, and share no byte with memory that is already free.
    pub fn free_block_group(&mut self, low: Address, high: Address) -> AllocResult<()> {
        let geometry = self.config.geometry;

        for address in [low, high] {
            if !geometry.is_block_aligned(address) {
                return Err(AllocError::Alignment {
                    address,
                    alignment: geometry.block_size(),
                });
            }
        }
        if low >= high {
            return Err(AllocError::invalid_range(low, high, "empty range"));
        }

        let megablock = geometry.megablock_of(low);
        let (area_low, area_high) = geometry.allocatable_range(megablock);
        if low < area_low || high > area_high {
            return Err(AllocError::invalid_range(
                low,
                high,
                "range leaves the block area of its megablock",
            ));
        }
        if self.pool.contains(&geometry, megablock) {
            warn!(
                "Attempted to free [{}, {}) inside pooled megablock {}",
                low, high, megablock
            );
            return Err(AllocError::DoubleFree { low, high });
        }
        if self.heap.get(&megablock) != Some(&MegablockCount(1)) {
            return Err(AllocError::invalid_range(
                low,
                high,
                "megablock does not hold small block groups",
            ));
        }

        if self.free_list.overlaps(low, high) {
            warn!(
                "Attempted to free [{}, {}) which overlaps free memory",
                low, high
            );
            return Err(AllocError::DoubleFree { low, high });
        }

        self.release_range(Interval::new(low, high))?;
        debug!(
            "Freed {} at {}",
            geometry.bytes_to_blocks(high.get() - low.get()),
            low
        );
        self.coalesce_free_block_groups();
        Ok(())
    }

    /// Sort the free list and merge touching intervals.
    ///
    /// With the megablock pool enabled, intervals covering a whole megablock's
    /// block area then move into the pool. Returns the number of merges.
    pub fn coalesce_free_block_groups(&mut self) -> usize {
        let before = self.free_list.len();
        let merged = self.free_list.coalesce();
        if merged > 0 {
            debug!(
                "Coalesced {} pairs of adjacent free intervals, reduced from {} to {}",
                merged,
                before,
                self.free_list.len()
            );
        }

        if self.config.pool_megablocks {
            let pooled = self.pool_free_megablocks();
            if pooled > 0 {
                info!("Released {} whole megablocks to the pool", pooled);
            }
        }

        debug_assert!(self.free_list.is_coalesced());
        merged
    }

    /// Scrub (when enabled) and push a range already known not to be free
    pub(super) fn release_range(&mut self, interval: Interval) -> AllocResult<()> {
        if self.config.scrub_freed {
            self.memory
                .fill(interval.low, self.config.scrub_byte, interval.len_bytes())?;
        }
        self.free_list.push(interval);
        Ok(())
    }
}
