/*!
 * Shared Block Allocator
 * Cloneable handle serializing every allocator operation behind one lock
 */

use super::manager::BlockAllocator;
use super::resource::MemoryResource;
use super::traits::BlockGroupAllocator;
use super::types::{AllocatorStats, ReclaimStats};
use crate::core::types::{Address, BlockCount, MegablockCount};
use crate::core::AllocResult;
use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe handle to a [`BlockAllocator`].
///
/// The free list cannot be maintained under concurrent mutation, so every
/// call, reads included, takes the same mutex.
pub struct SharedBlockAllocator<M: MemoryResource> {
    inner: Arc<Mutex<BlockAllocator<M>>>,
}

impl<M: MemoryResource> SharedBlockAllocator<M> {
    pub fn new(allocator: BlockAllocator<M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    pub fn allocate_block_group(&self, blocks: BlockCount) -> AllocResult<Address> {
        self.inner.lock().allocate_block_group(blocks)
    }

    pub fn free_block_group(&self, low: Address, high: Address) -> AllocResult<()> {
        self.inner.lock().free_block_group(low, high)
    }

    pub fn grow_megablocks(&self, count: MegablockCount) -> AllocResult<Address> {
        self.inner.lock().grow_megablocks(count)
    }

    pub fn reclaim_unreachable<I>(&self, live: I) -> AllocResult<ReclaimStats>
    where
        I: IntoIterator<Item = Address>,
    {
        self.inner.lock().reclaim_unreachable(live)
    }

    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the allocator
    pub fn with<R>(&self, f: impl FnOnce(&mut BlockAllocator<M>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<M: MemoryResource> Clone for SharedBlockAllocator<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: MemoryResource> BlockGroupAllocator for SharedBlockAllocator<M> {
    fn allocate_block_group(&mut self, blocks: BlockCount) -> AllocResult<Address> {
        SharedBlockAllocator::allocate_block_group(self, blocks)
    }

    fn reclaim_unreachable(&mut self, live: &[Address]) -> AllocResult<ReclaimStats> {
        SharedBlockAllocator::reclaim_unreachable(self, live.iter().copied())
    }

    fn grow_megablocks(&mut self, count: MegablockCount) -> AllocResult<Address> {
        SharedBlockAllocator::grow_megablocks(self, count)
    }
}
