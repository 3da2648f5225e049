//! Heap tuple format.
//!
//! A heap tuple is the byte image stored as one page item: a fixed header,
//! an optional null bitmap, an optional embedded row oid, and the
//! attribute payload.
//!
//! ## Header Layout (23 bytes, little-endian, no implicit padding)
//!
//! ```text
//! Offset  Size  Field       Description
//! ------  ----  ----------  --------------------------------------
//! 0       4     xmin        inserting transaction id
//! 4       4     xmax        deleting transaction id
//! 8       4     xvac        vacuum transaction id
//! 12      6     ctid        current version of this row
//! 18      2     infomask2   attribute count in the low 11 bits
//! 20      2     infomask    flag bits, see `infomask`
//! 22      1     hoff        offset of the attribute payload
//! ```
//!
//! When `HAS_NULL` is set, a bitmap follows the header: bit *i*, LSB
//! first within each byte, is set iff attribute *i*+1 is not null. When
//! `HAS_OID` is set, the row oid occupies the 4 bytes just before `hoff`.
//! `hoff` itself is rounded up to the maximum alignment, and attribute
//! values are then laid down back to back with no per-attribute
//! alignment.

use std::sync::Arc;

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::access::TupleDesc;
use crate::system::{
    max_align, AttrNumber, ItemPointer, Oid, StoreError, Xid, CMAX_ATTR_NUMBER, CMIN_ATTR_NUMBER,
    CTID_ATTR_NUMBER, INVALID_ITEM_POINTER, OID_ATTR_NUMBER, TABLE_OID_ATTR_NUMBER,
    XMAX_ATTR_NUMBER, XMIN_ATTR_NUMBER,
};
use crate::types::Datum;

/// Size of the fixed header prefix, up to but not including the null
/// bitmap.
pub const HEAP_TUPLE_HEADER_SIZE: usize = std::mem::size_of::<HeapTupleHeader>();

/// Heap tuple infomask bits.
pub mod infomask {
    pub const HAS_NULL: u16 = 0x0001;
    pub const HAS_VARWIDTH: u16 = 0x0002;
    pub const HAS_EXTERNAL: u16 = 0x0004;
    pub const HAS_OID: u16 = 0x0008;
    pub const XMAX_KEYSHR_LOCK: u16 = 0x0010;
    pub const COMBO_CID: u16 = 0x0020;
    pub const XMAX_EXCL_LOCK: u16 = 0x0040;
    pub const XMAX_LOCK_ONLY: u16 = 0x0080;
    pub const XMAX_SHR_LOCK: u16 = XMAX_EXCL_LOCK | XMAX_KEYSHR_LOCK;
    pub const LOCK_MASK: u16 = XMAX_SHR_LOCK | XMAX_EXCL_LOCK | XMAX_KEYSHR_LOCK;
    pub const XMIN_COMMITTED: u16 = 0x0100;
    pub const XMIN_INVALID: u16 = 0x0200;
    pub const XMAX_COMMITTED: u16 = 0x0400;
    pub const XMAX_INVALID: u16 = 0x0800;
    pub const XMAX_IS_MULTI: u16 = 0x1000;
    pub const UPDATED: u16 = 0x2000;
    pub const MOVED_OFF: u16 = 0x4000;
    pub const MOVED_IN: u16 = 0x8000;
    pub const XACT_MASK: u16 = 0xFFF0;
}

/// Mask extracting the attribute count from infomask2.
pub const NATTS_MASK: u16 = 0x07FF;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct HeapTupleHeader {
    xmin: U32,
    xmax: U32,
    xvac: U32,
    ctid_block: U32,
    ctid_offset: U16,
    infomask2: U16,
    infomask: U16,
    hoff: u8,
}

impl HeapTupleHeader {
    zerocopy_accessors! {
        xmin: u32,
        xmax: u32,
        xvac: u32,
        infomask2: u16,
        infomask: u16,
        hoff: u8,
    }

    pub fn ctid(&self) -> ItemPointer {
        ItemPointer::new(self.ctid_block.get(), self.ctid_offset.get())
    }

    pub fn set_ctid(&mut self, tid: ItemPointer) {
        self.ctid_block = U32::new(tid.block);
        self.ctid_offset = U16::new(tid.offset);
    }

    pub fn natts(&self) -> u16 {
        self.infomask2() & NATTS_MASK
    }

    pub fn set_natts(&mut self, natts: u16) {
        let masked = (self.infomask2() & !NATTS_MASK) | (natts & NATTS_MASK);
        self.set_infomask2(masked);
    }

    pub fn has_nulls(&self) -> bool {
        self.infomask() & infomask::HAS_NULL != 0
    }

    pub fn has_oid(&self) -> bool {
        self.infomask() & infomask::HAS_OID != 0
    }
}

fn bitmap_len(natts: usize) -> usize {
    natts.div_ceil(8)
}

/// A materialized heap tuple: owned bytes plus the descriptor that gives
/// them meaning, stamped with the tuple's own identity.
#[derive(Debug, Clone)]
pub struct HeapTuple {
    table_oid: Oid,
    self_tid: ItemPointer,
    desc: Arc<TupleDesc>,
    data: Vec<u8>,
}

impl HeapTuple {
    /// Builds a tuple image from a value vector. `None` entries are SQL
    /// nulls. Attribute values are written in declaration order with
    /// their fixed wire widths.
    pub fn form(values: &[Option<Datum>], desc: &Arc<TupleDesc>) -> eyre::Result<Self> {
        let natts = desc.natts();
        if values.len() != natts {
            return Err(StoreError::internal(format!(
                "value vector has {} entries for {} attributes",
                values.len(),
                natts
            ))
            .into());
        }

        let hasnull = values.iter().any(Option::is_none);

        let mut header_len = HEAP_TUPLE_HEADER_SIZE;
        if hasnull {
            header_len += bitmap_len(natts);
        }
        if desc.has_oid() {
            header_len += std::mem::size_of::<u32>();
        }
        let hoff = max_align(header_len);
        if hoff > u8::MAX as usize {
            return Err(StoreError::internal(format!(
                "tuple header of {hoff} bytes overflows the header offset"
            ))
            .into());
        }

        let mut tuple = Self {
            table_oid: Oid::INVALID,
            self_tid: INVALID_ITEM_POINTER,
            desc: Arc::clone(desc),
            data: vec![0u8; hoff],
        };

        {
            let header = tuple.header_mut();
            header.set_natts(natts as u16);
            header.set_hoff(hoff as u8);
            if desc.has_oid() {
                header.set_infomask(infomask::HAS_OID);
            }
            if hasnull {
                let mask = header.infomask() | infomask::HAS_NULL;
                header.set_infomask(mask);
            }
        }

        for (index, value) in values.iter().enumerate() {
            match value {
                Some(datum) => {
                    if hasnull {
                        tuple.data[HEAP_TUPLE_HEADER_SIZE + index / 8] |= 1 << (index % 8);
                    }
                    datum.encode(&mut tuple.data);
                }
                None => {}
            }
        }

        Ok(tuple)
    }

    /// Wraps the byte image of a page item, copying it out so the tuple
    /// outlives the buffer it came from.
    pub fn from_item(item: &[u8], desc: Arc<TupleDesc>, tid: ItemPointer) -> Self {
        debug_assert!(item.len() >= HEAP_TUPLE_HEADER_SIZE);
        Self {
            table_oid: Oid::INVALID,
            self_tid: tid,
            desc,
            data: item.to_vec(),
        }
    }

    fn header(&self) -> &HeapTupleHeader {
        HeapTupleHeader::ref_from_bytes(&self.data[..HEAP_TUPLE_HEADER_SIZE])
            .expect("tuple data always holds a header")
    }

    fn header_mut(&mut self) -> &mut HeapTupleHeader {
        HeapTupleHeader::mut_from_bytes(&mut self.data[..HEAP_TUPLE_HEADER_SIZE])
            .expect("tuple data always holds a header")
    }

    /// The tuple's byte image, the exact item written to a page.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn self_tid(&self) -> ItemPointer {
        self.self_tid
    }

    pub fn set_self(&mut self, tid: ItemPointer) {
        self.self_tid = tid;
    }

    pub fn table_oid(&self) -> Oid {
        self.table_oid
    }

    pub fn set_table_oid(&mut self, oid: Oid) {
        self.table_oid = oid;
    }

    pub fn xmin(&self) -> Xid {
        Xid::new(self.header().xmin())
    }

    pub fn set_xmin(&mut self, xmin: Xid) {
        self.header_mut().set_xmin(xmin.as_u32());
    }

    pub fn xmax(&self) -> Xid {
        Xid::new(self.header().xmax())
    }

    pub fn set_xmax(&mut self, xmax: Xid) {
        self.header_mut().set_xmax(xmax.as_u32());
    }

    pub fn ctid(&self) -> ItemPointer {
        self.header().ctid()
    }

    pub fn set_ctid(&mut self, tid: ItemPointer) {
        self.header_mut().set_ctid(tid);
    }

    pub fn natts(&self) -> u16 {
        self.header().natts()
    }

    pub fn has_nulls(&self) -> bool {
        self.header().has_nulls()
    }

    /// The embedded row oid, or the invalid oid for tuples without one.
    pub fn oid(&self) -> Oid {
        let header = self.header();
        if !header.has_oid() {
            return Oid::INVALID;
        }
        let at = header.hoff() as usize - std::mem::size_of::<u32>();
        Oid::new(u32::from_le_bytes(self.data[at..at + 4].try_into().unwrap()))
    }

    /// Stores the embedded row oid. The tuple's descriptor must declare
    /// one.
    pub fn set_oid(&mut self, oid: Oid) {
        let header = self.header();
        assert!(header.has_oid(), "tuple has no embedded oid");
        let at = header.hoff() as usize - std::mem::size_of::<u32>();
        self.data[at..at + 4].copy_from_slice(&oid.as_u32().to_le_bytes());
    }

    /// Whether the one-based attribute is null.
    pub fn is_null(&self, attnum: AttrNumber) -> bool {
        if !self.has_nulls() {
            return false;
        }
        let index = (attnum - 1) as usize;
        let byte = self.data[HEAP_TUPLE_HEADER_SIZE + (index >> 3)];
        byte & (1 << (index & 0x07)) == 0
    }

    /// Projects one attribute. Positive numbers select user attributes;
    /// negative numbers select system columns. A null is `None`.
    pub fn fetch(&self, attnum: AttrNumber) -> eyre::Result<Option<Datum>> {
        if attnum < 0 {
            return match attnum {
                CTID_ATTR_NUMBER => Ok(Some(Datum::Tid(self.self_tid))),
                OID_ATTR_NUMBER => Ok(Some(Datum::Oid(self.oid()))),
                XMIN_ATTR_NUMBER => Ok(Some(Datum::Xid(self.xmin()))),
                XMAX_ATTR_NUMBER => Ok(Some(Datum::Xid(self.xmax()))),
                // command ids need combo-cid machinery this layer lacks
                CMIN_ATTR_NUMBER | CMAX_ATTR_NUMBER => Ok(None),
                TABLE_OID_ATTR_NUMBER => Ok(Some(Datum::Oid(self.table_oid))),
                _ => Err(StoreError::internal(format!(
                    "invalid system attribute number {attnum}"
                ))
                .into()),
            };
        }
        if attnum == 0 || attnum > self.natts() as AttrNumber {
            return Err(StoreError::internal(format!(
                "attribute number {attnum} out of range"
            ))
            .into());
        }

        if self.is_null(attnum) {
            return Ok(None);
        }

        let mut offset = self.header().hoff() as usize;
        for before in 1..attnum {
            if self.is_null(before) {
                continue;
            }
            let attr = self.desc.attr((before - 1) as usize);
            offset += attr.type_info.wire_len();
        }

        let typid = self.desc.attr((attnum - 1) as usize).type_id;
        Datum::decode(typid, &self.data[offset..]).map(Some)
    }
}
