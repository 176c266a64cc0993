/*!
 * RTS Block Allocator Library
 * Block/megablock allocation for a garbage-collected heap
 */

pub mod core;
pub mod memory;
pub mod monitoring;
pub mod stable;

// Re-exports
pub use crate::core::{
    Address, AllocError, AllocResult, BlockCount, MegablockCount, ResourceError,
};
pub use memory::{
    AllocatorConfig, AllocatorStats, BlockAllocator, BlockDescriptor, BlockGroupAllocator,
    Geometry, Interval, LinearMemory, MemoryResource, ReclaimStats, SharedBlockAllocator,
};
pub use monitoring::init_tracing;
pub use stable::{StablePtr, StablePtrTable};
