/*!
 * Reclamation Sweep
 * Returning block groups the collector found unreachable to the free list
 */

use super::free_list::Interval;
use super::BlockAllocator;
use crate::core::types::{Address, MegablockCount};
use crate::core::{AllocError, AllocResult};
use crate::memory::descriptor::BlockDescriptor;
use crate::memory::resource::MemoryResource;
use crate::memory::types::ReclaimStats;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

impl<M: MemoryResource> BlockAllocator<M> {
    /// Free every block group not named in `live`.
    ///
    /// Live descriptors are validated before anything is freed, so a bad live
    /// set leaves the allocator untouched. Per block-group megablock, the block
    /// area minus live regions minus memory already free is released, which
    /// makes a repeated sweep with the same live set a no-op.
    pub fn reclaim_unreachable<I>(&mut self, live: I) -> AllocResult<ReclaimStats>
    where
        I: IntoIterator<Item = Address>,
    {
        let geometry = self.config.geometry;
        let live: BTreeSet<Address> = live.into_iter().collect();

        // Live groups by owning megablock, ascending
        let mut by_megablock: BTreeMap<Address, Vec<Interval>> = BTreeMap::new();
        for descriptor in &live {
            let region = self.live_region(*descriptor)?;
            by_megablock
                .entry(geometry.megablock_of(*descriptor))
                .or_default()
                .push(region);
        }

        let mut stats = ReclaimStats {
            live_groups: live.len(),
            ..ReclaimStats::new()
        };

        let runs: Vec<(Address, MegablockCount)> = self.heap_runs().collect();
        for (base, span) in runs {
            stats.megablocks_visited += span.get() as usize;

            if span.get() > 1 {
                if !by_megablock.contains_key(&base) {
                    self.release_large_run(base, span, &mut stats)?;
                }
                continue;
            }

            let (area_low, area_high) = geometry.allocatable_range(base);
            let mut occupied = by_megablock.remove(&base).unwrap_or_default();
            occupied.extend(self.free_list.intersecting(area_low, area_high));
            for gap in complement(area_low, area_high, occupied) {
                stats.freed_ranges += 1;
                stats.freed_blocks += u64::from(geometry.bytes_to_blocks(gap.len_bytes()).get());
                self.release_range(gap)?;
            }
        }

        self.coalesce_free_block_groups();

        info!(
            "Reclamation complete: {} live groups across {} megablocks, freed {} ranges ({} blocks), released {} large runs, {} free intervals",
            stats.live_groups,
            stats.megablocks_visited,
            stats.freed_ranges,
            stats.freed_blocks,
            stats.large_runs_released,
            self.free_list.len()
        );
        Ok(stats)
    }

    /// Memory of the live group described at `descriptor`, after checking it
    /// is an allocated group of a block-group megablock
    fn live_region(&self, descriptor: Address) -> AllocResult<Interval> {
        let geometry = self.config.geometry;
        let invalid = || AllocError::InvalidDescriptor {
            address: descriptor,
        };

        if !geometry.is_descriptor_slot(descriptor) {
            return Err(invalid());
        }
        let megablock = geometry.megablock_of(descriptor);
        let span = self.heap.get(&megablock).copied().ok_or_else(invalid)?;

        let d = BlockDescriptor::read(&self.memory, descriptor)?;
        if d.blocks.get() == 0 || d.start != geometry.block_for(descriptor) {
            return Err(invalid());
        }

        let end = d.start + geometry.blocks_to_bytes(d.blocks);
        if span.get() > 1 {
            // A large run holds exactly one group, described at its first slot
            if descriptor != geometry.first_descriptor(megablock)
                || geometry.megablocks_for(d.blocks) != span
            {
                return Err(invalid());
            }
            return Ok(Interval::new(d.start, end));
        }

        let (_, area_high) = geometry.allocatable_range(megablock);
        if end > area_high || self.free_list.overlaps(d.start, end) {
            debug!("Stale or corrupt descriptor {} names [{}, {})", descriptor, d.start, end);
            return Err(invalid());
        }
        Ok(Interval::new(d.start, end))
    }

    /// Split a dead large run back into single megablocks with free block areas
    fn release_large_run(
        &mut self,
        base: Address,
        span: MegablockCount,
        stats: &mut ReclaimStats,
    ) -> AllocResult<()> {
        let geometry = self.config.geometry;
        self.heap.remove(&base);
        for i in 0..span.get() {
            let megablock = base + geometry.megablocks_to_bytes(MegablockCount(i));
            self.heap.insert(megablock, MegablockCount(1));
            let (low, high) = geometry.allocatable_range(megablock);
            self.release_range(Interval::new(low, high))?;
            stats.freed_ranges += 1;
            stats.freed_blocks += u64::from(geometry.blocks_per_megablock().get());
        }
        stats.large_runs_released += 1;
        debug!("Released large run of {} at {}", span, base);
        Ok(())
    }
}

/// Parts of `[low, high)` not covered by `occupied`
fn complement(low: Address, high: Address, mut occupied: Vec<Interval>) -> Vec<Interval> {
    occupied.sort_unstable();
    let mut gaps = Vec::new();
    let mut cursor = low;
    for interval in occupied {
        if interval.low > cursor {
            gaps.push(Interval::new(cursor, interval.low));
        }
        cursor = cursor.max(interval.high);
    }
    if cursor < high {
        gaps.push(Interval::new(cursor, high));
    }
    gaps
}
