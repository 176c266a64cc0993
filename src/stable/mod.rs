/*!
 * Stable Pointers
 * Opaque handles to managed values that survive collection
 */

pub mod table;

pub use table::{StablePtr, StablePtrTable, StableTag};
