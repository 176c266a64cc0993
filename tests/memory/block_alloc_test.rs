/*!
 * Block Allocator Tests
 * First-fit placement, growth, coalescing and large-group behaviour
 */

use pretty_assertions::assert_eq;
use rts_blockalloc::{
    Address, AllocError, AllocatorConfig, BlockAllocator, BlockCount, Geometry, Interval,
    LinearMemory, MegablockCount,
};

const BLOCK: u64 = 4096;
const MB: u64 = 64 * 1024;

/// 15 blocks per megablock, first block at 4KB
fn geometry() -> Geometry {
    Geometry::new(BLOCK, MB, 64).unwrap()
}

fn allocator(megablocks: u32) -> BlockAllocator<LinearMemory> {
    let memory = LinearMemory::with_page_size(u64::from(megablocks), MB);
    BlockAllocator::init(
        memory,
        MegablockCount::new(megablocks),
        AllocatorConfig::default().with_geometry(geometry()),
    )
    .unwrap()
}

fn region(alloc: &BlockAllocator<LinearMemory>, descriptor: Address) -> (Address, Address) {
    let d = alloc.descriptor(descriptor).unwrap();
    (d.start, d.start + u64::from(d.blocks.get()) * BLOCK)
}

fn free_blocks(alloc: &BlockAllocator<LinearMemory>) -> Vec<u64> {
    alloc
        .free_list()
        .as_slice()
        .iter()
        .map(|i| i.len_bytes() / BLOCK)
        .collect()
}

#[test]
fn test_first_fit_picks_first_large_enough_interval() {
    let mut alloc = allocator(1);

    // Megablock 1: 3 | 1 | 10 | 1, megablock 2: 5 | 10
    let g1 = alloc.allocate_block_group(BlockCount::new(3)).unwrap();
    alloc.allocate_block_group(BlockCount::new(1)).unwrap();
    let g3 = alloc.allocate_block_group(BlockCount::new(10)).unwrap();
    alloc.allocate_block_group(BlockCount::new(1)).unwrap();
    let g5 = alloc.allocate_block_group(BlockCount::new(5)).unwrap();
    alloc.allocate_block_group(BlockCount::new(10)).unwrap();
    assert!(alloc.free_list().is_empty());

    for g in [g1, g3, g5] {
        let (low, high) = region(&alloc, g);
        alloc.free_block_group(low, high).unwrap();
    }
    assert_eq!(free_blocks(&alloc), vec![3, 10, 5]);

    let (g3_low, _) = region(&alloc, g3);
    let desc = alloc.allocate_block_group(BlockCount::new(4)).unwrap();
    assert_eq!(desc, g3);
    assert_eq!(alloc.descriptor(desc).unwrap().start, g3_low);

    assert_eq!(free_blocks(&alloc), vec![3, 6, 5]);
    assert_eq!(alloc.free_list().as_slice()[1].low, g3_low + 4 * BLOCK);
    assert_eq!(alloc.free_list().as_slice()[0], {
        let (low, high) = region(&alloc, g1);
        Interval::new(low, high)
    });
}

#[test]
fn test_round_trip_restores_free_list() {
    let mut alloc = allocator(1);
    alloc.allocate_block_group(BlockCount::new(2)).unwrap();
    let before = alloc.free_list().as_slice().to_vec();

    let desc = alloc.allocate_block_group(BlockCount::new(6)).unwrap();
    let (low, high) = region(&alloc, desc);
    alloc.free_block_group(low, high).unwrap();

    assert_eq!(alloc.free_list().as_slice(), before.as_slice());
}

#[test]
fn test_adjacent_frees_merge_in_either_order() {
    for order in [[0usize, 1], [1, 0]] {
        let mut alloc = allocator(1);
        let groups = [
            alloc.allocate_block_group(BlockCount::new(4)).unwrap(),
            alloc.allocate_block_group(BlockCount::new(4)).unwrap(),
        ];
        alloc.allocate_block_group(BlockCount::new(7)).unwrap();

        for i in order {
            let (low, high) = region(&alloc, groups[i]);
            alloc.free_block_group(low, high).unwrap();
        }

        let (first_low, _) = region(&alloc, groups[0]);
        assert_eq!(
            alloc.free_list().as_slice(),
            &[Interval::new(first_low, first_low + 8 * BLOCK)]
        );
    }
}

#[test]
fn test_growth_doubles_capacity() {
    let mut alloc = allocator(4);
    alloc.grow_megablocks(MegablockCount::new(1)).unwrap();
    assert_eq!(alloc.capacity(), MegablockCount::new(8));

    let mut alloc = allocator(4);
    alloc.grow_megablocks(MegablockCount::new(10)).unwrap();
    assert_eq!(alloc.capacity(), MegablockCount::new(14));
}

#[test]
fn test_growth_is_logarithmic() {
    let mut alloc = allocator(1);
    let mut grows = 0;
    for _ in 0..64 {
        let before = alloc.capacity();
        alloc.grow_megablocks(MegablockCount::new(1)).unwrap();
        if alloc.capacity() != before {
            grows += 1;
        }
    }
    assert_eq!(alloc.size(), MegablockCount::new(65));
    assert_eq!(alloc.capacity(), MegablockCount::new(128));
    assert_eq!(grows, 7);
}

#[test]
fn test_large_allocation_bypasses_free_list() {
    let mut alloc = allocator(1);
    alloc.allocate_block_group(BlockCount::new(1)).unwrap();
    let free_before = alloc.free_list().as_slice().to_vec();
    let size_before = alloc.size();

    let per_megablock = geometry().blocks_per_megablock().get();
    let desc = alloc
        .allocate_block_group(BlockCount::new(per_megablock + 1))
        .unwrap();

    assert_eq!(alloc.free_list().as_slice(), free_before.as_slice());
    assert_eq!(alloc.size().get(), size_before.get() + 2);
    assert_eq!(desc, Address::new(u64::from(size_before.get()) * MB + 64));

    let d = alloc.descriptor(desc).unwrap();
    assert_eq!(d.blocks, BlockCount::new(per_megablock + 1));
    assert!(d.link.is_null());
}

#[test]
fn test_exact_megablock_request_takes_whole_megablock() {
    let mut alloc = allocator(1);
    let per_megablock = geometry().blocks_per_megablock();
    alloc.allocate_block_group(per_megablock).unwrap();
    assert!(alloc.free_list().is_empty());
    assert_eq!(alloc.size(), MegablockCount::new(2));
}

#[test]
fn test_out_of_memory_propagates() {
    let memory = LinearMemory::with_page_size(1, MB).with_max_pages(2);
    let mut alloc = BlockAllocator::init(
        memory,
        MegablockCount::new(1),
        AllocatorConfig::default().with_geometry(geometry()),
    )
    .unwrap();

    alloc.allocate_block_group(BlockCount::new(15)).unwrap();
    let err = alloc.allocate_block_group(BlockCount::new(1)).unwrap_err();
    assert!(matches!(err, AllocError::OutOfMemory { .. }));
    assert!(!err.is_protocol_violation());
}

#[test]
fn test_default_geometry_end_to_end() {
    let memory = LinearMemory::new(16);
    let mut alloc =
        BlockAllocator::init(memory, MegablockCount::new(1), AllocatorConfig::debug()).unwrap();

    let desc = alloc.allocate_block_group(BlockCount::new(8)).unwrap();
    let d = alloc.descriptor(desc).unwrap();
    assert_eq!(d.start, Address::new(1024 * 1024 + 16 * 1024));
    assert_eq!(desc, Address::new(1024 * 1024 + 256));

    let stats = alloc.stats();
    assert_eq!(stats.free_blocks, 252 - 8);
    assert_eq!(stats.heap_megablocks, 1);
}
