//! # Access Layer
//!
//! Typed rows over the storage layer: tuple descriptors, the on-item heap
//! tuple format, the compiled-in bootstrap catalog, and heap relations
//! with their sequential scans.

pub mod catalog;
pub mod heap;
pub mod heap_tuple;

pub use catalog::{ATTRIBUTE_REL_ID, ATTRIBUTE_TUPLE_DESC, CLASS_REL_ID, CLASS_TUPLE_DESC};
pub use heap::{heap_open, HeapRelation, HeapScan, ScanKeys};
pub use heap_tuple::{HeapTuple, HeapTupleHeader, HEAP_TUPLE_HEADER_SIZE};

use crate::system::{AttrNumber, Oid};
use crate::types::{type_info, Datum, Name, TypeInfo};

/// One attribute of a tuple descriptor: its name, declared type oid, and
/// the resolved registry entry.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: Name,
    pub type_id: Oid,
    pub type_info: &'static TypeInfo,
}

impl Attribute {
    pub fn new(name: &str, type_id: Oid) -> eyre::Result<Self> {
        Ok(Self {
            name: Name::new(name)?,
            type_id,
            type_info: type_info(type_id)?,
        })
    }
}

/// An ordered attribute list describing a tuple shape. Immutable once
/// built; relations share their descriptor behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    attrs: Vec<Attribute>,
    typid: Oid,
    has_oid: bool,
}

impl TupleDesc {
    pub fn new(attrs: Vec<Attribute>, typid: Oid, has_oid: bool) -> Self {
        Self {
            attrs,
            typid,
            has_oid,
        }
    }

    pub fn natts(&self) -> usize {
        self.attrs.len()
    }

    /// The attribute at a zero-based index.
    pub fn attr(&self, index: usize) -> &Attribute {
        &self.attrs[index]
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn typid(&self) -> Oid {
        self.typid
    }

    /// Whether tuples of this shape embed a row oid in their header.
    pub fn has_oid(&self) -> bool {
        self.has_oid
    }
}

/// A scan qualifier: attribute number (system columns allowed) and the
/// value it must equal. Scans carry keys through to their consumer; the
/// scan itself does not evaluate them.
#[derive(Debug, Clone)]
pub struct ScanKey {
    pub attnum: AttrNumber,
    pub value: Datum,
}
