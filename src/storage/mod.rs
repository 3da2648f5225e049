//! # Storage Layer
//!
//! Everything below the tuple abstraction: block-granular file I/O, the
//! shared buffer pool, and the slotted page format.
//!
//! ## Components
//!
//! - [`smgr`]: maps a relation's [`RelFileNode`](crate::system::RelFileNode)
//!   to its backing file and moves whole blocks in and out
//! - [`bufmgr`]: a fixed pool of pinned, clock-swept frames fronting the
//!   segment manager, run by a single owning thread
//! - [`page`]: the slotted layout inside one block
//! - [`item_id`]: the packed line pointers that address items on a page
//!
//! ## Ownership
//!
//! The pool exclusively owns frame memory. A [`Buffer`] handle is a
//! borrowed, pinned view; holders reach the bytes only through the frame
//! lock and give the frame back by dropping the handle. Nothing a caller
//! obtains from a buffer may outlive the handle it came from.

pub mod bufmgr;
pub mod item_id;
pub mod page;
pub mod smgr;

pub use bufmgr::{Buffer, BufferManager, BufferTag, FrameReadGuard, FrameWriteGuard, NEW_BLOCK};
pub use item_id::{ItemId, ItemIdState, ITEM_ID_LEN};
pub use page::{page_flags, Page, PageHeader, PAGE_HEADER_SIZE};
pub use smgr::SegmentManager;

use crate::config::BLOCK_SIZE;

/// One block's worth of bytes, the unit of every transfer.
pub type Block = [u8; BLOCK_SIZE];
