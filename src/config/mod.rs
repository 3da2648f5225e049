//! # Configuration Constants
//!
//! This module centralizes the crate's tunables and fixed layout constants,
//! grouping interdependent values together so a change to one is checked
//! against the values that depend on it.
//!
//! ## Dependency Graph
//!
//! ```text
//! BLOCK_SIZE (4096 bytes)
//!       │
//!       ├─> relation file sizes (always a whole multiple of BLOCK_SIZE)
//!       │
//!       ├─> MAX_OFFSET_NUMBER (BLOCK_SIZE / 2, one line pointer per
//!       │     2 bytes is the densest possible packing)
//!       │
//!       └─> page header pagesize|version field (high byte carries the
//!             page size, so BLOCK_SIZE must fit in 0xFF00)
//!
//! MAXIMUM_ALIGN_OF (8)
//!       │
//!       ├─> special-space offset rounding in page init
//!       │
//!       └─> heap tuple header offset (hoff) rounding
//!
//! MAX_USAGE_COUNT (10)
//!       │
//!       └─> clock sweep passes needed to age a hot frame to eviction;
//!           set a little high because every pin bumps the count, even
//!           repeated pins from the same caller
//! ```

/// Unit of I/O: every read, write, and extend moves exactly one block.
pub const BLOCK_SIZE: usize = 4096;

/// Hard alignment for on-page structures. Tuple payload offsets and the
/// special-space boundary are rounded up to this.
pub const MAXIMUM_ALIGN_OF: usize = 8;

/// On-disk width of the `name` type, trailing NUL included.
pub const NAME_LEN: usize = 64;

/// Ceiling for a frame's usage count under the clock sweep.
pub const MAX_USAGE_COUNT: u16 = 10;

/// Default number of frames in a buffer pool.
pub const DEFAULT_BUFFER_COUNT: usize = 16;

/// Current slotted page layout version, stored in the low byte of the
/// header's pagesize|version field.
pub const PAGE_LAYOUT_VERSION: u16 = 4;
