/*!
 * Megablock Growth
 * Committing megablocks from the backing memory
 */

use super::BlockAllocator;
use crate::core::types::{Address, MegablockCount};
use crate::core::{AllocError, AllocResult};
use crate::memory::resource::MemoryResource;
use log::{debug, error, info};

impl<M: MemoryResource> BlockAllocator<M> {
    /// Commit `count` contiguous megablocks and return the first one's base.
    ///
    /// When committed megablocks would exceed capacity the memory grows by
    /// `max(count, capacity)` megablocks. A refused grow surfaces as
    /// [`AllocError::OutOfMemory`] and leaves all state unchanged.
    pub fn grow_megablocks(&mut self, count: MegablockCount) -> AllocResult<Address> {
        if count.get() == 0 {
            return Err(AllocError::invalid_request("zero megablocks requested"));
        }

        let needed = self
            .size
            .get()
            .checked_add(count.get())
            .ok_or(AllocError::OutOfMemory {
                requested_megablocks: count,
                capacity: self.capacity,
            })?;

        if needed > self.capacity.get() {
            let delta = count.get().max(self.capacity.get());
            let pages = self
                .geometry()
                .megablocks_to_bytes(MegablockCount(delta))
                / self.memory.page_size();

            if let Err(e) = self.memory.grow(pages) {
                error!(
                    "OOM: growing by {} megablocks ({} pages) failed at capacity {}: {}",
                    delta, pages, self.capacity, e
                );
                return Err(AllocError::OutOfMemory {
                    requested_megablocks: count,
                    capacity: self.capacity,
                });
            }

            let grown = self.capacity.get() + delta;
            info!(
                "Backing memory grew by {} megablocks: capacity {} -> {}",
                delta, self.capacity, grown
            );
            self.capacity = MegablockCount(grown);
        }

        let base = Address(u64::from(self.size.get()) * self.geometry().megablock_size());
        self.size = MegablockCount(needed);
        debug!("Committed {} at {} (size now {})", count, base, self.size);
        Ok(base)
    }

    /// Megablocks for block groups: pooled ones first, then fresh growth
    pub(super) fn acquire_megablocks(&mut self, count: MegablockCount) -> AllocResult<Address> {
        if self.config.pool_megablocks {
            let geometry = self.config.geometry;
            if let Some(base) = self.pool.take(&geometry, count) {
                debug!("Reusing pooled {} at {}", count, base);
                self.heap.insert(base, count);
                return Ok(base);
            }
        }

        let base = self.grow_megablocks(count)?;
        self.heap.insert(base, count);
        Ok(base)
    }

    /// Move block-level megablocks whose entire block area is free into the pool
    pub(super) fn pool_free_megablocks(&mut self) -> usize {
        let geometry = self.config.geometry;
        let heap = &self.heap;
        let whole = self.free_list.extract_if(|interval| {
            let megablock = geometry.megablock_of(interval.low);
            (interval.low, interval.high) == geometry.allocatable_range(megablock)
                && heap.get(&megablock) == Some(&MegablockCount(1))
        });

        for interval in &whole {
            let megablock = geometry.megablock_of(interval.low);
            self.heap.remove(&megablock);
            self.pool.insert(&geometry, megablock, MegablockCount(1));
        }

        if !whole.is_empty() {
            debug!(
                "Pooled {} free megablocks ({} now pooled)",
                whole.len(),
                self.pool.megablocks()
            );
        }
        whole.len()
    }
}
