/*!
 * Free Block Group List
 * Address-ordered intervals of unallocated block memory
 */

use crate::core::types::Address;
use serde::{Deserialize, Serialize};

/// Half-open byte interval `[low, high)` of free blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub low: Address,
    pub high: Address,
}

impl Interval {
    #[inline]
    pub fn new(low: Address, high: Address) -> Self {
        debug_assert!(low < high, "empty interval [{}, {})", low, high);
        Self { low, high }
    }

    #[inline]
    pub fn len_bytes(&self) -> u64 {
        self.high.get() - self.low.get()
    }

    #[inline]
    pub fn overlaps(&self, low: Address, high: Address) -> bool {
        self.low < high && low < self.high
    }

    #[inline]
    pub fn contains(&self, low: Address, high: Address) -> bool {
        self.low <= low && high <= self.high
    }
}

/// Free list of block groups.
///
/// Lookup is first-fit in list order. After [`FreeList::coalesce`] the list is
/// sorted by address and no two intervals touch or overlap.
#[derive(Debug, Clone, Default)]
pub struct FreeList {
    intervals: Vec<Interval>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn total_bytes(&self) -> u64 {
        self.intervals.iter().map(Interval::len_bytes).sum()
    }

    pub fn push(&mut self, interval: Interval) {
        self.intervals.push(interval);
    }

    /// Index of the first interval holding at least `bytes` bytes
    pub fn first_fit(&self, bytes: u64) -> Option<usize> {
        self.intervals.iter().position(|i| i.len_bytes() >= bytes)
    }

    /// Take `bytes` from the low end of interval `index`, returning its start.
    ///
    /// The interval shrinks in place, keeping its list position, or is
    /// removed once nothing remains.
    pub fn carve(&mut self, index: usize, bytes: u64) -> Address {
        let interval = self.intervals[index];
        debug_assert!(interval.len_bytes() >= bytes);
        if interval.len_bytes() > bytes {
            self.intervals[index].low = interval.low + bytes;
        } else {
            self.intervals.remove(index);
        }
        interval.low
    }

    /// Whether any free interval shares a byte with `[low, high)`
    pub fn overlaps(&self, low: Address, high: Address) -> bool {
        self.intervals.iter().any(|i| i.overlaps(low, high))
    }

    /// Free intervals clipped to `[low, high)`, sorted by address
    pub fn intersecting(&self, low: Address, high: Address) -> Vec<Interval> {
        let mut clipped: Vec<Interval> = self
            .intervals
            .iter()
            .filter(|i| i.overlaps(low, high))
            .map(|i| Interval::new(i.low.max(low), i.high.min(high)))
            .collect();
        clipped.sort_unstable();
        clipped
    }

    /// Remove every interval matching `pred`, returning them in list order
    pub fn extract_if<F>(&mut self, mut pred: F) -> Vec<Interval>
    where
        F: FnMut(&Interval) -> bool,
    {
        let mut taken = Vec::new();
        self.intervals.retain(|i| {
            if pred(i) {
                taken.push(*i);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Sort by address and merge touching neighbours in one pass.
    ///
    /// Returns the number of merges performed.
    pub fn coalesce(&mut self) -> usize {
        if self.intervals.len() < 2 {
            return 0;
        }

        self.intervals.sort_unstable_by_key(|i| i.low);

        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        let mut coalesced_count = 0;
        for interval in self.intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if last.high == interval.low => {
                    last.high = interval.high;
                    coalesced_count += 1;
                }
                _ => merged.push(interval),
            }
        }
        self.intervals = merged;
        coalesced_count
    }

    /// Sorted, non-empty, and no two intervals touching or overlapping
    pub fn is_coalesced(&self) -> bool {
        self.intervals.iter().all(|i| i.low < i.high)
            && self.intervals.windows(2).all(|w| w[0].high < w[1].low)
    }
}
