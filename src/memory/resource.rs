/*!
 * Growable Memory Resource
 * The linear byte space the allocator carves megablocks from
 */

use crate::core::limits::DEFAULT_PAGE_SIZE;
use crate::core::types::Address;
use crate::core::ResourceError;
use log::debug;

/// Result of raw memory operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Linear memory that only grows, in whole pages.
///
/// All integer access is little-endian.
pub trait MemoryResource {
    /// Growth granularity in bytes
    fn page_size(&self) -> u64;

    /// Current length in bytes, always a whole number of pages
    fn current_size(&self) -> u64;

    /// Extend by `delta_pages` pages, returning the previous page count
    fn grow(&mut self, delta_pages: u64) -> ResourceResult<u64>;

    fn load_i64(&self, addr: Address) -> ResourceResult<i64>;

    fn store_i64(&mut self, addr: Address, value: i64) -> ResourceResult<()>;

    fn load_i32(&self, addr: Address) -> ResourceResult<i32>;

    fn store_i32(&mut self, addr: Address, value: i32) -> ResourceResult<()>;

    /// Set `len` bytes starting at `addr` to `byte`
    fn fill(&mut self, addr: Address, byte: u8, len: u64) -> ResourceResult<()>;
}

/// `Vec<u8>`-backed linear memory with an optional page limit
#[derive(Debug, Clone)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    page_size: u64,
    max_pages: Option<u64>,
}

impl LinearMemory {
    /// Memory of `pages` zeroed pages using the default 64KB page
    pub fn new(pages: u64) -> Self {
        Self::with_page_size(pages, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(pages: u64, page_size: u64) -> Self {
        Self {
            bytes: vec![0u8; (pages * page_size) as usize],
            page_size,
            max_pages: None,
        }
    }

    /// Refuse to grow past `max_pages` total pages
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn pages(&self) -> u64 {
        self.bytes.len() as u64 / self.page_size
    }

    /// Borrow raw bytes, mostly for inspection in tests
    pub fn read_bytes(&self, addr: Address, len: u64) -> ResourceResult<&[u8]> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    fn range(&self, addr: Address, len: u64) -> ResourceResult<std::ops::Range<usize>> {
        let size = self.bytes.len() as u64;
        match addr.get().checked_add(len) {
            Some(end) if end <= size => Ok(addr.get() as usize..end as usize),
            _ => Err(ResourceError::OutOfBounds {
                address: addr,
                len,
                size,
            }),
        }
    }

    fn load<const N: usize>(&self, addr: Address) -> ResourceResult<[u8; N]> {
        let range = self.range(addr, N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[range]);
        Ok(out)
    }

    fn store(&mut self, addr: Address, data: &[u8]) -> ResourceResult<()> {
        let range = self.range(addr, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

impl MemoryResource for LinearMemory {
    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn current_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn grow(&mut self, delta_pages: u64) -> ResourceResult<u64> {
        let current_pages = self.pages();
        let target = current_pages.checked_add(delta_pages);
        let within_limit = match (target, self.max_pages) {
            (Some(target), Some(max)) => target <= max,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !within_limit {
            return Err(ResourceError::GrowFailed {
                requested_pages: delta_pages,
                current_pages,
                max_pages: self.max_pages,
            });
        }

        let new_len = (current_pages + delta_pages) * self.page_size;
        self.bytes.resize(new_len as usize, 0);
        debug!(
            "Linear memory grew by {} pages to {} pages ({} bytes)",
            delta_pages,
            current_pages + delta_pages,
            new_len
        );
        Ok(current_pages)
    }

    fn load_i64(&self, addr: Address) -> ResourceResult<i64> {
        self.load::<8>(addr).map(i64::from_le_bytes)
    }

    fn store_i64(&mut self, addr: Address, value: i64) -> ResourceResult<()> {
        self.store(addr, &value.to_le_bytes())
    }

    fn load_i32(&self, addr: Address) -> ResourceResult<i32> {
        self.load::<4>(addr).map(i32::from_le_bytes)
    }

    fn store_i32(&mut self, addr: Address, value: i32) -> ResourceResult<()> {
        self.store(addr, &value.to_le_bytes())
    }

    fn fill(&mut self, addr: Address, byte: u8, len: u64) -> ResourceResult<()> {
        let range = self.range(addr, len)?;
        self.bytes[range].fill(byte);
        Ok(())
    }
}
