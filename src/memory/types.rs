/*!
 * Memory Types
 * Statistics reported by the block allocator
 */

use crate::core::types::MegablockCount;
use serde::{Deserialize, Serialize};

/// Snapshot of allocator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    /// Megablocks backed by memory
    pub capacity: MegablockCount,
    /// Megablocks committed, reserved region included
    pub size: MegablockCount,
    /// Megablocks reserved for static data
    pub reserved: MegablockCount,
    /// Megablocks holding block groups
    pub heap_megablocks: usize,
    pub free_intervals: usize,
    pub free_blocks: u64,
    pub pooled_megablocks: u32,
}

impl AllocatorStats {
    /// Fraction of heap block memory currently free
    pub fn free_ratio(&self, blocks_per_megablock: u32) -> f64 {
        let total = self.heap_megablocks as u64 * u64::from(blocks_per_megablock);
        if total == 0 {
            0.0
        } else {
            self.free_blocks as f64 / total as f64
        }
    }
}

/// Outcome of one reclamation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimStats {
    pub megablocks_visited: usize,
    pub live_groups: usize,
    /// Ranges handed back to the free list before coalescing
    pub freed_ranges: usize,
    pub freed_blocks: u64,
    pub large_runs_released: usize,
}

impl ReclaimStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if anything was reclaimed
    pub fn freed_any(&self) -> bool {
        self.freed_ranges > 0
    }
}
