/*!
 * Memory Traits
 * The interface the garbage collector drives
 */

use super::types::ReclaimStats;
use crate::core::types::{Address, BlockCount, MegablockCount};
use crate::core::AllocResult;

/// Block group allocation as seen by the collector
pub trait BlockGroupAllocator {
    /// Allocate a group of `blocks` blocks, returning its descriptor address
    fn allocate_block_group(&mut self, blocks: BlockCount) -> AllocResult<Address>;

    /// Free every block group whose descriptor is not in `live`
    fn reclaim_unreachable(&mut self, live: &[Address]) -> AllocResult<ReclaimStats>;

    /// Raw megablock-aligned space outside the block group abstraction
    fn grow_megablocks(&mut self, count: MegablockCount) -> AllocResult<Address>;
}
