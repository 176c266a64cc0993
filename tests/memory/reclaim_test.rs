/*!
 * Reclamation Tests
 * Sweeps after collection cycles: completeness, idempotency, conservation
 */

use pretty_assertions::assert_eq;
use rts_blockalloc::{
    Address, AllocError, AllocatorConfig, BlockAllocator, BlockCount, Geometry, Interval,
    LinearMemory, MegablockCount, MemoryResource, SharedBlockAllocator,
};

const BLOCK: u64 = 4096;
const MB: u64 = 64 * 1024;

fn allocator(config: AllocatorConfig) -> BlockAllocator<LinearMemory> {
    let geometry = Geometry::new(BLOCK, MB, 64).unwrap();
    let memory = LinearMemory::with_page_size(1, MB);
    BlockAllocator::init(memory, MegablockCount::new(1), config.with_geometry(geometry)).unwrap()
}

fn region(alloc: &BlockAllocator<LinearMemory>, descriptor: Address) -> Interval {
    let d = alloc.descriptor(descriptor).unwrap();
    Interval::new(d.start, d.start + u64::from(d.blocks.get()) * BLOCK)
}

#[test]
fn test_unnamed_middle_group_is_reclaimed() {
    let mut alloc = allocator(AllocatorConfig::default().with_scrub(0x42));
    let first = alloc.allocate_block_group(BlockCount::new(3)).unwrap();
    let second = alloc.allocate_block_group(BlockCount::new(4)).unwrap();
    let third = alloc.allocate_block_group(BlockCount::new(8)).unwrap();

    // Fill the survivors with a pattern that must come through untouched
    for g in [first, third] {
        let r = region(&alloc, g);
        alloc.memory_mut().fill(r.low, 0x7f, r.len_bytes()).unwrap();
    }
    let first_desc = alloc.descriptor(first).unwrap();
    let third_desc = alloc.descriptor(third).unwrap();

    let stats = alloc.reclaim_unreachable([first, third]).unwrap();
    assert_eq!(stats.freed_blocks, 4);

    let second_region = region(&alloc, second);
    assert_eq!(alloc.free_list().as_slice(), &[second_region]);

    assert_eq!(alloc.descriptor(first).unwrap(), first_desc);
    assert_eq!(alloc.descriptor(third).unwrap(), third_desc);
    for g in [first, third] {
        let r = region(&alloc, g);
        let bytes = alloc.memory().read_bytes(r.low, r.len_bytes()).unwrap();
        assert!(bytes.iter().all(|b| *b == 0x7f));
    }
    let scrubbed = alloc
        .memory()
        .read_bytes(second_region.low, second_region.len_bytes())
        .unwrap();
    assert!(scrubbed.iter().all(|b| *b == 0x42));
}

#[test]
fn test_repeated_sweep_issues_no_frees() {
    let mut alloc = allocator(AllocatorConfig::default());
    let keep = alloc.allocate_block_group(BlockCount::new(2)).unwrap();
    alloc.allocate_block_group(BlockCount::new(5)).unwrap();
    alloc.allocate_block_group(BlockCount::new(20)).unwrap();

    let first = alloc.reclaim_unreachable([keep]).unwrap();
    assert!(first.freed_any());
    assert_eq!(first.large_runs_released, 1);
    let snapshot = alloc.free_list().as_slice().to_vec();

    let second = alloc.reclaim_unreachable([keep]).unwrap();
    assert_eq!(second.freed_ranges, 0);
    assert_eq!(second.large_runs_released, 0);
    assert_eq!(alloc.free_list().as_slice(), snapshot.as_slice());
}

#[test]
fn test_reclaimed_large_run_serves_small_groups() {
    let mut alloc = allocator(AllocatorConfig::default());
    alloc.allocate_block_group(BlockCount::new(30)).unwrap();
    alloc.reclaim_unreachable([]).unwrap();
    let size = alloc.size();

    // Both halves of the dead run are usable without growth, but never as
    // one group crossing the descriptor area of the second megablock
    let a = alloc.allocate_block_group(BlockCount::new(15)).unwrap();
    let b = alloc.allocate_block_group(BlockCount::new(15)).unwrap();
    assert_eq!(alloc.size(), size);
    assert_eq!(b.get() - a.get(), MB);
}

#[test]
fn test_invalid_live_set_changes_nothing() {
    let mut alloc = allocator(AllocatorConfig::default());
    let a = alloc.allocate_block_group(BlockCount::new(2)).unwrap();
    alloc.allocate_block_group(BlockCount::new(2)).unwrap();
    let before = alloc.stats();

    let err = alloc
        .reclaim_unreachable([a, Address::new(0xdead_0000)])
        .unwrap_err();
    assert!(matches!(err, AllocError::InvalidDescriptor { .. }));
    assert!(err.is_protocol_violation());
    assert_eq!(alloc.stats(), before);
}

#[test]
fn test_conservation_after_cycles() {
    let mut alloc = allocator(AllocatorConfig::default());
    let mut live = Vec::new();

    for cycle in 0..5u32 {
        for i in 0..12u32 {
            live.push(
                alloc
                    .allocate_block_group(BlockCount::new(1 + (i * 7 + cycle) % 6))
                    .unwrap(),
            );
        }
        let survivors: Vec<Address> = live
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| i % 3 == cycle as usize % 3)
            .map(|(_, d)| d)
            .collect();
        alloc.reclaim_unreachable(survivors.iter().copied()).unwrap();
        live = survivors;

        assert!(alloc.free_list().is_coalesced());
        let geometry = *alloc.geometry();
        for (base, span) in alloc.heap_runs() {
            assert_eq!(span, MegablockCount::new(1));
            let (low, high) = geometry.allocatable_range(base);

            let mut covered: Vec<Interval> = alloc.free_list().intersecting(low, high);
            covered.extend(
                live.iter()
                    .filter(|d| geometry.megablock_of(**d) == base)
                    .map(|d| region(&alloc, *d)),
            );
            covered.sort();

            let mut cursor = low;
            for interval in covered {
                assert_eq!(interval.low, cursor, "gap or overlap in megablock {}", base);
                cursor = interval.high;
            }
            assert_eq!(cursor, high);
        }
    }
}

#[test]
fn test_pool_feeds_large_allocations() {
    let mut alloc = allocator(AllocatorConfig::default().with_megablock_pool());
    alloc.allocate_block_group(BlockCount::new(10)).unwrap();
    alloc.allocate_block_group(BlockCount::new(10)).unwrap();
    alloc.reclaim_unreachable([]).unwrap();

    assert_eq!(alloc.pool().megablocks(), 2);
    assert!(alloc.free_list().is_empty());
    let size = alloc.size();

    let big = alloc.allocate_block_group(BlockCount::new(16)).unwrap();
    assert_eq!(alloc.size(), size);
    assert_eq!(big, Address::new(MB + 64));
    assert!(alloc.pool().is_empty());
}

#[test]
fn test_shared_handle_reclaims() {
    let shared = SharedBlockAllocator::new(allocator(AllocatorConfig::default()));
    let keep = shared.allocate_block_group(BlockCount::new(3)).unwrap();
    let dead = shared.allocate_block_group(BlockCount::new(3)).unwrap();

    let other = shared.clone();
    let stats = std::thread::spawn(move || other.reclaim_unreachable([keep]).unwrap())
        .join()
        .unwrap();
    assert_eq!(stats.freed_blocks, 3);

    let reused = shared.allocate_block_group(BlockCount::new(3)).unwrap();
    assert_eq!(reused, dead);
}
