//! # heapstore - Slotted-Page Heap Storage Engine
//!
//! heapstore is the storage core of a relational database engine: durable,
//! block-addressable storage for relations, a pinning/eviction buffer pool
//! mediating memory and disk, a slotted page layout with stable item
//! identifiers, a typed heap-tuple format on top of those items, and a
//! minimal self-describing catalog.
//!
//! ## Architecture
//!
//! The crate is layered bottom-up:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Heap Relation & Sequential Scan    │
//! ├─────────────────────────────────────┤
//! │   Heap Tuples │ Bootstrap Catalog    │
//! ├───────────────┴─────────────────────┤
//! │   Slotted Page / Line Pointers       │
//! ├─────────────────────────────────────┤
//! │   Buffer Pool (pin / clock sweep)    │
//! ├─────────────────────────────────────┤
//! │   Segment Manager (block file I/O)   │
//! └─────────────────────────────────────┘
//! ```
//!
//! A sequential scan requests a page from the buffer manager, which resolves
//! the block in its lookup table or evicts a victim and issues a segment
//! read. The returned frame is pinned; the page interprets its bytes as a
//! slotted page; the scan walks line pointers, materializing heap tuples
//! that project attributes through the relation's tuple descriptor.
//!
//! ## File Layout
//!
//! One file per relation, resolved against the data directory:
//!
//! ```text
//! data_dir/
//! └── base/
//!     ├── global/<relid>    # shared catalogs (tablespace 1664)
//!     └── <dbid>/<relid>    # per-database relations (tablespace 1663)
//! ```
//!
//! Every relation file is a whole multiple of the 4096-byte block size.
//!
//! ## Concurrency Model
//!
//! The buffer manager runs as an actor: a single owning thread serializes
//! all pin/unpin traffic and I/O dispatch over request channels, while page
//! content is protected by per-frame reader/writer locks that callers
//! acquire through their pinned [`storage::Buffer`] handles.
//!
//! ## Module Overview
//!
//! - [`system`]: fixed-width identifiers, transaction-id ordering, alignment
//!   helpers, relation file paths, typed errors
//! - [`types`]: the `Datum` value layer and per-type metadata registry
//! - [`storage`]: segment manager, buffer pool, slotted pages, line pointers
//! - [`access`]: heap tuples, tuple descriptors, catalog bootstrap, scans

#[macro_use]
mod macros;

pub mod access;
pub mod config;
pub mod storage;
pub mod system;
pub mod types;

pub use access::{heap_open, HeapRelation, HeapScan, HeapTuple, TupleDesc};
pub use storage::{Buffer, BufferManager, Page, SegmentManager};
pub use system::{BlockNumber, ItemPointer, Oid, OffsetNumber, RelFileNode, Xid};
pub use types::Datum;
