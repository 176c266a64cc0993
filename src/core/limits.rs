/*!
 * System Limits and Constants
 *
 * Centralized location for the allocator's default sizing parameters.
 * Values follow the GHC block layout: 4KB blocks, 1MB megablocks and
 * 64-byte block descriptors packed at the start of every megablock.
 */

// =============================================================================
// GEOMETRY DEFAULTS
// =============================================================================

/// Block size (4KB)
/// Smallest allocation granularity handed to the heap
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024;

/// Megablock size (1MB)
/// Unit of growth from the backing memory
pub const DEFAULT_MEGABLOCK_SIZE: u64 = 1024 * 1024;

/// Block descriptor record size (64 bytes)
pub const DEFAULT_DESCRIPTOR_SIZE: u64 = 64;

// =============================================================================
// BACKING MEMORY
// =============================================================================

/// Page size of the growable memory (64KB, the WebAssembly page)
pub const DEFAULT_PAGE_SIZE: u64 = 64 * 1024;

// =============================================================================
// DEBUGGING AIDS
// =============================================================================

/// Byte written into reclaimed memory when scrubbing is enabled
pub const DEFAULT_SCRUB_BYTE: u8 = 0x42;

/// Env var toggling scrubbing of freed memory
pub const ENV_SCRUB: &str = "BLOCKALLOC_SCRUB";

/// Env var toggling the free megablock pool
pub const ENV_POOL_MEGABLOCKS: &str = "BLOCKALLOC_POOL_MEGABLOCKS";

/// Env var switching the simulator's trace output to JSON
pub const ENV_TRACE_JSON: &str = "BLOCKALLOC_TRACE_JSON";
