//! Slotted page layout.
//!
//! A disk block is just a unit of I/O; a page is the slotted structure an
//! access method lays over it:
//!
//! ```text
//! +----------------+---------------------------------+
//! | page header    | linp1 linp2 linp3 ...           |
//! +-----------+----+---------------------------------+
//! | ... linpN |                                      |
//! +-----------+--------------------------------------+
//! |           ^ lower                                |
//! |                                                  |
//! |             v upper                              |
//! +-------------+------------------------------------+
//! |             | tupleN ...                         |
//! +-------------+------------------+-----------------+
//! |       ... tuple3 tuple2 tuple1 | "special space" |
//! +--------------------------------+-----------------+
//!                                  ^ special
//! ```
//!
//! The line pointer array grows forward from the header; tuple payloads
//! grow backward from the special space. Tuple identifiers address line
//! pointer slots, never byte offsets, so payloads may be shuffled
//! physically whenever the need arises.
//!
//! ## Header Layout (24 bytes, little-endian)
//!
//! ```text
//! Offset  Size  Field             Description
//! ------  ----  ----------------  -----------------------------------
//! 0       8     lsn               WAL position of last change (unused here)
//! 8       2     checksum          page checksum (unused here)
//! 10      2     flags             hint bits, see `page_flags`
//! 12      2     lower             end of the line pointer array
//! 14      2     upper             start of the tuple payload area
//! 16      2     special           start of the AM-specific trailer
//! 18      2     pagesize_version  page size in the high byte, layout
//!                                 version in the low byte
//! 20      4     prune_xid         oldest unpruned xmax on the page
//! ```

use tracing::warn;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{BLOCK_SIZE, PAGE_LAYOUT_VERSION};
use crate::storage::item_id::{ItemId, ITEM_ID_LEN};
use crate::system::{
    max_align, OffsetNumber, Xid, FIRST_OFFSET_NUMBER, INVALID_OFFSET_NUMBER, MAX_OFFSET_NUMBER,
};

/// Size of the fixed page header; line pointers do not count as part of it.
pub const PAGE_HEADER_SIZE: usize = std::mem::size_of::<PageHeader>();

/// Page header hint bits. Undefined bits are initialized to zero.
pub mod page_flags {
    /// There may be UNUSED line pointers before `lower`. A hint, not a
    /// truth: cheap to check, verified on use.
    pub const HAS_FREE_LINES: u16 = 0x0001;
    /// An update failed to find room on the page, suggesting a prune.
    /// Also a hint.
    pub const FULL: u16 = 0x0002;
    /// Every tuple on the page is visible to all transactions.
    pub const ALL_VISIBLE: u16 = 0x0004;

    pub const VALID_BITS: u16 = 0x0007;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PageHeader {
    lsn: U64,
    checksum: U16,
    flags: U16,
    lower: U16,
    upper: U16,
    special: U16,
    pagesize_version: U16,
    prune_xid: U32,
}

impl PageHeader {
    zerocopy_accessors! {
        lsn: u64,
        checksum: u16,
        flags: u16,
        lower: u16,
        upper: u16,
        special: u16,
        pagesize_version: u16,
        prune_xid: u32,
    }
}

/// A slotted page view over one block of bytes. Read accessors are
/// available through any byte source; mutation requires a mutable one.
pub struct Page<B> {
    block: B,
}

impl<B: AsRef<[u8]>> Page<B> {
    /// Wraps a block. The byte source must be exactly one block long.
    pub fn new(block: B) -> Self {
        assert_eq!(block.as_ref().len(), BLOCK_SIZE, "invalid block bytes");
        Page { block }
    }

    fn header(&self) -> &PageHeader {
        PageHeader::ref_from_bytes(&self.block.as_ref()[..PAGE_HEADER_SIZE])
            .expect("block prefix always holds a page header")
    }

    pub fn bytes(&self) -> &[u8] {
        self.block.as_ref()
    }

    pub fn lsn(&self) -> u64 {
        self.header().lsn()
    }

    pub fn checksum(&self) -> u16 {
        self.header().checksum()
    }

    pub fn flags(&self) -> u16 {
        self.header().flags()
    }

    pub fn lower(&self) -> u16 {
        self.header().lower()
    }

    pub fn upper(&self) -> u16 {
        self.header().upper()
    }

    pub fn special(&self) -> u16 {
        self.header().special()
    }

    /// Page size recorded in the header, in the high byte of the combined
    /// field.
    pub fn page_size(&self) -> u16 {
        self.header().pagesize_version() & 0xFF00
    }

    pub fn layout_version(&self) -> u16 {
        self.header().pagesize_version() & 0x00FF
    }

    pub fn prune_xid(&self) -> Xid {
        Xid::new(self.header().prune_xid())
    }

    pub fn has_free_line_pointers(&self) -> bool {
        self.flags() & page_flags::HAS_FREE_LINES != 0
    }

    pub fn is_full(&self) -> bool {
        self.flags() & page_flags::FULL != 0
    }

    pub fn is_all_visible(&self) -> bool {
        self.flags() & page_flags::ALL_VISIBLE != 0
    }

    /// A new page has never been initialized; its upper pointer is still
    /// zero.
    pub fn is_new(&self) -> bool {
        self.upper() == 0
    }

    /// An empty page has been initialized but holds no line pointers.
    pub fn is_empty(&self) -> bool {
        self.lower() as usize <= PAGE_HEADER_SIZE
    }

    /// True iff the page may benefit from pruning given the oldest xmin
    /// any snapshot can still see. The caller must pass a normal xid.
    pub fn is_prunable(&self, oldest_xmin: Xid) -> bool {
        assert!(oldest_xmin.is_normal(), "oldest xmin must be a normal xid");
        let prune_xid = self.prune_xid();
        prune_xid.is_valid() && prune_xid.precedes(oldest_xmin)
    }

    /// Number of line pointers on the page. Zero for an uninitialized
    /// page, whose lower pointer is still zero.
    pub fn max_offset_number(&self) -> OffsetNumber {
        let lower = self.lower() as isize;
        let offset_bytes = lower - PAGE_HEADER_SIZE as isize;
        if offset_bytes <= 0 {
            0
        } else {
            (offset_bytes as usize / ITEM_ID_LEN) as OffsetNumber
        }
    }

    /// Reads the line pointer at a one-based slot.
    pub fn item_id(&self, offset: OffsetNumber) -> ItemId {
        let at = PAGE_HEADER_SIZE + (offset as usize - 1) * ITEM_ID_LEN;
        let bytes = &self.block.as_ref()[at..at + ITEM_ID_LEN];
        ItemId::from_le_bytes(bytes.try_into().unwrap())
    }

    /// Returns the bytes of the item a line pointer addresses.
    pub fn item(&self, item_id: ItemId) -> &[u8] {
        let offset = item_id.offset() as usize;
        let length = item_id.length() as usize;
        &self.block.as_ref()[offset..offset + length]
    }

    /// Free space between the line pointer array and the payload area,
    /// reduced by the room one more line pointer would need.
    pub fn free_space(&self) -> usize {
        let space = self.upper() as isize - self.lower() as isize;
        if space < ITEM_ID_LEN as isize {
            0
        } else {
            space as usize - ITEM_ID_LEN
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    fn header_mut(&mut self) -> &mut PageHeader {
        PageHeader::mut_from_bytes(&mut self.block.as_mut()[..PAGE_HEADER_SIZE])
            .expect("block prefix always holds a page header")
    }

    pub fn set_lsn(&mut self, lsn: u64) {
        self.header_mut().set_lsn(lsn);
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.header_mut().set_checksum(checksum);
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.header_mut().set_flags(flags);
    }

    pub fn set_lower(&mut self, lower: u16) {
        self.header_mut().set_lower(lower);
    }

    pub fn set_upper(&mut self, upper: u16) {
        self.header_mut().set_upper(upper);
    }

    pub fn set_special(&mut self, special: u16) {
        self.header_mut().set_special(special);
    }

    pub fn set_page_size_and_version(&mut self, size: u16, version: u16) {
        assert_eq!(size & 0xFF00, size, "invalid page size");
        assert_eq!(version & 0x00FF, version, "invalid layout version");
        self.header_mut().set_pagesize_version(size | version);
    }

    pub fn set_prune_xid(&mut self, xid: Xid) {
        self.header_mut().set_prune_xid(xid.as_u32());
    }

    pub fn clear_prunable(&mut self) {
        self.set_prune_xid(Xid::INVALID);
    }

    pub fn set_has_free_line_pointers(&mut self) {
        let flags = self.flags() | page_flags::HAS_FREE_LINES;
        self.set_flags(flags);
    }

    pub fn clear_has_free_line_pointers(&mut self) {
        let flags = self.flags() & !page_flags::HAS_FREE_LINES;
        self.set_flags(flags);
    }

    pub fn set_full(&mut self) {
        let flags = self.flags() | page_flags::FULL;
        self.set_flags(flags);
    }

    pub fn clear_full(&mut self) {
        let flags = self.flags() & !page_flags::FULL;
        self.set_flags(flags);
    }

    pub fn set_all_visible(&mut self) {
        let flags = self.flags() | page_flags::ALL_VISIBLE;
        self.set_flags(flags);
    }

    pub fn clear_all_visible(&mut self) {
        let flags = self.flags() & !page_flags::ALL_VISIBLE;
        self.set_flags(flags);
    }

    /// Writes the line pointer at a one-based slot.
    pub fn set_item_id(&mut self, offset: OffsetNumber, item_id: ItemId) {
        let at = PAGE_HEADER_SIZE + (offset as usize - 1) * ITEM_ID_LEN;
        self.block.as_mut()[at..at + ITEM_ID_LEN].copy_from_slice(&item_id.to_le_bytes());
    }

    /// Initializes the page: zeroes the block, reserves `special_size`
    /// bytes (rounded up to the maximum alignment) at the tail, and stamps
    /// the size and layout version.
    pub fn init(&mut self, special_size: usize) {
        let special_size = max_align(special_size);
        assert!(
            special_size <= BLOCK_SIZE - PAGE_HEADER_SIZE,
            "special space will not fit on the page"
        );
        self.block.as_mut().fill(0);
        let offset_special = (BLOCK_SIZE - special_size) as u16;
        self.set_lower(PAGE_HEADER_SIZE as u16);
        self.set_upper(offset_special);
        self.set_special(offset_special);
        self.set_page_size_and_version(BLOCK_SIZE as u16, PAGE_LAYOUT_VERSION);
    }

    /// Adds an item to the page, returning the slot it landed in, or the
    /// invalid offset number if it does not fit or the request is refused.
    ///
    /// With a valid `offset` the item is placed at exactly that slot:
    /// under `overwrite` the slot must be free; otherwise existing line
    /// pointers from the slot onward are shifted one place right, the only
    /// operation that renumbers live slots. With no offset, a slot is
    /// found by the free-lines hint or appended at the end.
    pub fn add_item(
        &mut self,
        item: &[u8],
        offset: OffsetNumber,
        overwrite: bool,
        _is_heap: bool,
    ) -> OffsetNumber {
        // Header pointers out of order mean the page is corrupt, and
        // nothing below is safe to run.
        if (self.lower() as usize) < PAGE_HEADER_SIZE
            || self.lower() > self.upper()
            || self.upper() > self.special()
            || self.special() as usize > BLOCK_SIZE
        {
            panic!(
                "corrupted page pointers: lower = {}, upper = {}, special = {}",
                self.lower(),
                self.upper(),
                self.special()
            );
        }

        let limit = self.max_offset_number() + 1;
        let mut offset = offset;
        let mut needshuffle = false;

        if offset != INVALID_OFFSET_NUMBER && offset <= MAX_OFFSET_NUMBER {
            if overwrite {
                if offset < limit {
                    let item_id = self.item_id(offset);
                    if item_id.is_used() || item_id.has_storage() {
                        warn!(offset, "will not overwrite a used line pointer");
                        return INVALID_OFFSET_NUMBER;
                    }
                }
            } else if offset < limit {
                // slot is occupied, existing pointers shift right
                needshuffle = true;
            }
        } else if self.has_free_line_pointers() {
            offset = FIRST_OFFSET_NUMBER;
            while offset < limit {
                let item_id = self.item_id(offset);
                if !item_id.is_used() && !item_id.has_storage() {
                    break;
                }
                offset += 1;
            }
            if offset >= limit {
                // the hint lied, stop consulting it
                self.clear_has_free_line_pointers();
            }
        } else {
            offset = limit;
        }

        if offset > limit {
            warn!(offset, limit, "requested item offset is too large");
            return INVALID_OFFSET_NUMBER;
        }

        // Compute new lower and upper, as signed values so an oversized
        // item cannot wrap the arithmetic.
        let mut lower = self.lower() as i32;
        if offset == limit || needshuffle {
            lower += ITEM_ID_LEN as i32;
        }
        let aligned_len = max_align(item.len());
        let upper = self.upper() as i32 - aligned_len as i32;

        if lower > upper {
            return INVALID_OFFSET_NUMBER;
        }

        if needshuffle {
            let src = PAGE_HEADER_SIZE + (offset as usize - 1) * ITEM_ID_LEN;
            let end = PAGE_HEADER_SIZE + (limit as usize - 1) * ITEM_ID_LEN;
            self.block.as_mut().copy_within(src..end, src + ITEM_ID_LEN);
        }

        let mut item_id = ItemId::default();
        item_id.set_normal(upper as u32, item.len() as u32);
        self.set_item_id(offset, item_id);

        let upper = upper as usize;
        self.block.as_mut()[upper..upper + item.len()].copy_from_slice(item);

        self.set_lower(lower as u16);
        self.set_upper(upper as u16);

        offset
    }
}
