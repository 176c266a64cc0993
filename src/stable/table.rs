/*!
 * Stable Pointer Table
 *
 * Maps opaque integer handles to values. The low bit of a handle is its tag:
 * `0` for heap addresses pinned by the runtime, `1` for host values. Each tag
 * counts independently, so handle `n << 1 | tag` is never reused.
 */

use ahash::RandomState;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Largest per-tag counter whose handle still fits after the tag shift
const MAX_COUNTER: u32 = u32::MAX >> 1;

/// Kind of value a stable pointer refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StableTag {
    /// Heap address pinned for foreign code
    Value = 0,
    /// Host-side value
    Host = 1,
}

/// Opaque stable pointer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StablePtr(pub u32);

impl StablePtr {
    pub fn tag(self) -> StableTag {
        if self.0 & 1 == 1 {
            StableTag::Host
        } else {
            StableTag::Value
        }
    }
}

/// Handle table with per-tag counters
#[derive(Debug)]
pub struct StablePtrTable<V> {
    entries: HashMap<StablePtr, V, RandomState>,
    lasts: [u32; 2],
}

impl<V: Clone> Default for StablePtrTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> StablePtrTable<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_hasher(RandomState::new()),
            lasts: [0, 0],
        }
    }

    fn insert_tagged(&mut self, value: V, tag: StableTag) -> Option<StablePtr> {
        let slot = &mut self.lasts[tag as usize];
        let next = slot.checked_add(1).filter(|n| *n <= MAX_COUNTER)?;
        *slot = next;
        let ptr = StablePtr((next << 1) | tag as u32);
        self.entries.insert(ptr, value);
        Some(ptr)
    }

    /// Pin a heap value. `None` once every handle of the tag has been issued.
    pub fn new_stable_ptr(&mut self, value: V) -> Option<StablePtr> {
        self.insert_tagged(value, StableTag::Value)
    }

    /// Register a host value. `None` once every handle of the tag has been issued.
    pub fn new_host_val(&mut self, value: V) -> Option<StablePtr> {
        self.insert_tagged(value, StableTag::Host)
    }

    pub fn deref(&self, ptr: StablePtr) -> Option<&V> {
        self.entries.get(&ptr)
    }

    pub fn contains(&self, ptr: StablePtr) -> bool {
        self.entries.contains_key(&ptr)
    }

    pub fn free(&mut self, ptr: StablePtr) -> Option<V> {
        self.entries.remove(&ptr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StablePtr, &V)> + '_ {
        self.entries.iter().map(|(ptr, value)| (*ptr, value))
    }

    /// Point `dst` at the value of `src`. Returns false if `src` is unknown.
    pub fn set(&mut self, dst: StablePtr, src: StablePtr) -> bool {
        match self.entries.get(&src).cloned() {
            Some(value) => {
                self.entries.insert(dst, value);
                true
            }
            None => false,
        }
    }

    /// Move the value of `src` to `dst`, freeing `src`
    pub fn move_val(&mut self, dst: StablePtr, src: StablePtr) -> bool {
        match self.entries.remove(&src) {
            Some(value) => {
                self.entries.insert(dst, value);
                true
            }
            None => false,
        }
    }

    /// Drop every host value not in `live`; pinned heap values stay.
    /// Returns how many were dropped.
    pub fn preserve_host_vals(&mut self, live: &HashSet<StablePtr>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|ptr, _| ptr.tag() == StableTag::Value || live.contains(ptr));
        let dropped = before - self.entries.len();
        debug!("Dropped {} unreachable host values", dropped);
        dropped
    }
}
