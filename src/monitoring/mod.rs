/*!
 * Monitoring Module
 * Tracing setup for binaries embedding the allocator
 */

pub mod tracer;

pub use tracer::{cycle_span, init_tracing};
