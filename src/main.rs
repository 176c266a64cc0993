/*!
 * Block Allocator Simulator - Main Entry Point
 *
 * Drives the allocator through synthetic mutator/collector cycles:
 * - allocates block groups of mixed sizes
 * - keeps a deterministic subset live, some pinned via stable pointers
 * - reclaims the rest after every cycle
 */

use anyhow::Context;
use rts_blockalloc::monitoring::cycle_span;
use rts_blockalloc::{
    init_tracing, Address, AllocatorConfig, BlockAllocator, BlockCount, LinearMemory,
    MegablockCount, StablePtrTable,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// Megablocks reserved below the heap for static data
const STATIC_MEGABLOCKS: u32 = 1;

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tiny deterministic generator so runs are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cycles = env_or("BLOCKALLOC_CYCLES", 8);
    let per_cycle = env_or("BLOCKALLOC_GROUPS_PER_CYCLE", 64);
    let config = AllocatorConfig::from_env();
    let geometry = config.geometry;
    let per_megablock = geometry.blocks_per_megablock().get();

    info!(
        cycles,
        per_cycle,
        scrub = config.scrub_freed,
        pool = config.pool_megablocks,
        "Block allocator simulator starting"
    );

    let pages = geometry.megablocks_to_bytes(MegablockCount::new(STATIC_MEGABLOCKS))
        / rts_blockalloc::core::limits::DEFAULT_PAGE_SIZE;
    let memory = LinearMemory::new(pages);
    let mut alloc = BlockAllocator::init(memory, MegablockCount::new(STATIC_MEGABLOCKS), config)
        .context("initializing block allocator")?;

    let mut rng = Lcg(0x5eed);
    let mut pinned: StablePtrTable<Address> = StablePtrTable::new();
    let mut live: Vec<Address> = Vec::new();

    for cycle in 0..cycles {
        let span = cycle_span(cycle);
        let _enter = span.enter();

        for _ in 0..per_cycle {
            // Mostly small groups, the occasional multi-megablock one
            let blocks = if rng.next() % 32 == 0 {
                per_megablock + (rng.next() % u64::from(per_megablock)) as u32
            } else {
                1 + (rng.next() % 8) as u32
            };
            match alloc.allocate_block_group(BlockCount::new(blocks)) {
                Ok(descriptor) => {
                    if rng.next() % 64 == 0 && pinned.new_stable_ptr(descriptor).is_none() {
                        warn!(%descriptor, "Stable pointer handles exhausted");
                    }
                    live.push(descriptor);
                }
                Err(e) => {
                    warn!(error = %e, blocks, "Allocation failed");
                    return Err(e).context("allocating block group");
                }
            }
        }

        // Survivors: roughly a quarter of the groups plus everything pinned
        let mut survivors: HashSet<Address> = live
            .iter()
            .copied()
            .filter(|_| rng.next() % 4 == 0)
            .collect();
        survivors.extend(pinned.iter().map(|(_, descriptor)| *descriptor));

        let stats = alloc
            .reclaim_unreachable(survivors.iter().copied())
            .context("reclaiming unreachable groups")?;
        live.retain(|d| survivors.contains(d));

        let snapshot = alloc.stats();
        info!(
            live = live.len(),
            freed_blocks = stats.freed_blocks,
            free_intervals = snapshot.free_intervals,
            capacity = snapshot.capacity.get(),
            size = snapshot.size.get(),
            "Cycle complete"
        );
    }

    let summary = serde_json::to_string_pretty(&alloc.stats()).context("serializing stats")?;
    println!("{}", summary);
    Ok(())
}
