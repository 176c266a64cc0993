/*!
 * Allocator Configuration
 *
 * Runtime configuration for geometry and debugging aids
 */

use super::geometry::Geometry;
use crate::core::limits::{DEFAULT_SCRUB_BYTE, ENV_POOL_MEGABLOCKS, ENV_SCRUB};
use serde::{Deserialize, Serialize};

/// Block allocator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    pub geometry: Geometry,
    /// Fill freed block memory with `scrub_byte` to surface use-after-free
    pub scrub_freed: bool,
    pub scrub_byte: u8,
    /// Move wholly free megablocks into a pool reused before growing
    pub pool_megablocks: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            scrub_freed: false,
            scrub_byte: DEFAULT_SCRUB_BYTE,
            pool_megablocks: false,
        }
    }
}

impl AllocatorConfig {
    /// Configuration for tests and debugging: freed memory is scrubbed
    pub fn debug() -> Self {
        Self {
            scrub_freed: true,
            ..Self::default()
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_scrub(mut self, scrub_byte: u8) -> Self {
        self.scrub_freed = true;
        self.scrub_byte = scrub_byte;
        self
    }

    pub fn with_megablock_pool(mut self) -> Self {
        self.pool_megablocks = true;
        self
    }

    /// Defaults overridden by `BLOCKALLOC_SCRUB` and `BLOCKALLOC_POOL_MEGABLOCKS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(scrub) = env_flag(ENV_SCRUB) {
            config.scrub_freed = scrub;
        }
        if let Some(pool) = env_flag(ENV_POOL_MEGABLOCKS) {
            config.pool_megablocks = pool;
        }
        config
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
