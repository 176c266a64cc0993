/*!
 * Memory Module
 * Block and megablock allocation for the managed heap
 */

pub mod config;
pub mod descriptor;
pub mod geometry;
pub mod manager;
pub mod resource;
pub mod shared;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use config::AllocatorConfig;
pub use descriptor::BlockDescriptor;
pub use geometry::Geometry;
pub use manager::{BlockAllocator, FreeList, Interval, MegablockPool};
pub use resource::{LinearMemory, MemoryResource};
pub use shared::SharedBlockAllocator;
pub use traits::*;
pub use types::*;
