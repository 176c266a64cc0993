/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{Address, MegablockCount};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allocator operation result
pub type AllocResult<T> = Result<T, AllocError>;

/// Block/megablock allocator errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AllocError {
    #[error("Configuration error: {reason}")]
    #[diagnostic(
        code(blockalloc::configuration),
        help("Geometry must use power-of-two sizes and the memory size must be a whole number of megablocks.")
    )]
    Configuration { reason: String },

    #[error("Out of memory: could not commit {requested_megablocks} (capacity {capacity})")]
    #[diagnostic(
        code(blockalloc::out_of_memory),
        help("The backing memory refused to grow. Run a collection cycle before retrying.")
    )]
    OutOfMemory {
        requested_megablocks: MegablockCount,
        capacity: MegablockCount,
    },

    #[error("Double free: [{low}, {high}) overlaps a free interval")]
    #[diagnostic(
        code(blockalloc::double_free),
        help("A block group was returned twice. This is a collector/allocator protocol violation.")
    )]
    DoubleFree { low: Address, high: Address },

    #[error("Alignment error: address {address}, required alignment {alignment}")]
    #[diagnostic(
        code(blockalloc::alignment),
        help("Block addresses must be block aligned and megablock addresses megablock aligned.")
    )]
    Alignment { address: Address, alignment: u64 },

    #[error("Invalid range [{low}, {high}): {reason}")]
    #[diagnostic(
        code(blockalloc::invalid_range),
        help("Freed ranges must be non-empty and lie inside one committed megablock's block area.")
    )]
    InvalidRange {
        low: Address,
        high: Address,
        reason: String,
    },

    #[error("Invalid request: {reason}")]
    #[diagnostic(
        code(blockalloc::invalid_request),
        help("Request at least one block or megablock.")
    )]
    InvalidRequest { reason: String },

    #[error("Backing memory error: {0}")]
    #[diagnostic(code(blockalloc::resource))]
    Resource(#[from] ResourceError),

    #[error("Invalid block descriptor at {address}")]
    #[diagnostic(
        code(blockalloc::invalid_descriptor),
        help("Only descriptors of currently allocated block groups may be passed as live.")
    )]
    InvalidDescriptor { address: Address },
}

/// Failures reported by the growable memory resource
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ResourceError {
    #[error("Cannot grow by {requested_pages} pages from {current_pages} (limit {max_pages:?})")]
    #[diagnostic(code(resource::grow_failed))]
    GrowFailed {
        requested_pages: u64,
        current_pages: u64,
        max_pages: Option<u64>,
    },

    #[error("Access of {len} bytes at {address} is outside {size} bytes of memory")]
    #[diagnostic(code(resource::out_of_bounds))]
    OutOfBounds { address: Address, len: u64, size: u64 },
}

impl AllocError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        AllocError::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        AllocError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_range(low: Address, high: Address, reason: impl Into<String>) -> Self {
        AllocError::InvalidRange {
            low,
            high,
            reason: reason.into(),
        }
    }

    /// Programming-error faults: the caller broke the allocator protocol
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AllocError::DoubleFree { .. }
                | AllocError::Alignment { .. }
                | AllocError::InvalidRange { .. }
                | AllocError::InvalidDescriptor { .. }
        )
    }
}
