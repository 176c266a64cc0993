/*!
 * Free Megablock Pool
 * Whole megablocks returned by the block level, kept for reuse as runs
 */

use crate::core::types::{Address, MegablockCount};
use crate::memory::geometry::Geometry;
use std::collections::BTreeMap;

/// Address-ordered runs of free megablocks, keyed by base address.
/// Adjacent runs are merged on insert.
#[derive(Debug, Clone, Default)]
pub struct MegablockPool {
    runs: BTreeMap<Address, MegablockCount>,
}

impl MegablockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Total pooled megablocks
    pub fn megablocks(&self) -> u32 {
        self.runs.values().map(|c| c.get()).sum()
    }

    pub fn runs(&self) -> impl Iterator<Item = (Address, MegablockCount)> + '_ {
        self.runs.iter().map(|(a, c)| (*a, *c))
    }

    /// Whether the megablock at `megablock` lies in a pooled run
    pub fn contains(&self, geometry: &Geometry, megablock: Address) -> bool {
        self.runs
            .range(..=megablock)
            .next_back()
            .is_some_and(|(base, count)| megablock < *base + geometry.megablocks_to_bytes(*count))
    }

    pub fn insert(&mut self, geometry: &Geometry, base: Address, count: MegablockCount) {
        let mut base = base;
        let mut count = count.get();

        // Merge with the run ending right at `base`
        let previous = self
            .runs
            .range(..base)
            .next_back()
            .map(|(a, c)| (*a, *c));
        if let Some((prev_base, prev_count)) = previous {
            if prev_base + geometry.megablocks_to_bytes(prev_count) == base {
                self.runs.remove(&prev_base);
                base = prev_base;
                count += prev_count.get();
            }
        }

        // Merge with the run starting right after ours
        let end = base + geometry.megablocks_to_bytes(MegablockCount(count));
        if let Some(next_count) = self.runs.remove(&end) {
            count += next_count.get();
        }

        self.runs.insert(base, MegablockCount(count));
    }

    /// Take `count` megablocks from the lowest run large enough
    pub fn take(&mut self, geometry: &Geometry, count: MegablockCount) -> Option<Address> {
        let (base, available) = self
            .runs
            .iter()
            .find(|(_, c)| **c >= count)
            .map(|(a, c)| (*a, *c))?;

        self.runs.remove(&base);
        if available > count {
            let rest = base + geometry.megablocks_to_bytes(count);
            self.runs
                .insert(rest, MegablockCount(available.get() - count.get()));
        }
        Some(base)
    }
}
