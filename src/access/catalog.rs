//! Bootstrap catalog.
//!
//! Two relations describe every other relation: `bp_class` names them and
//! `bp_attribute` lists their attributes. Their own descriptors are
//! compiled in, so opening either of them never consults the catalog;
//! that guard is what keeps catalog lookup from recursing forever.

use std::sync::{Arc, LazyLock};

use crate::access::{Attribute, TupleDesc};
use crate::system::{AttrNumber, Oid};

/// Oid of `bp_class`: `(relname name, relfilenode oid)`, rows carry oids.
pub const CLASS_REL_ID: Oid = Oid::new(1259);

/// Oid of `bp_attribute`:
/// `(attrelid oid, attname name, attnum int4, atttypid oid)`.
pub const ATTRIBUTE_REL_ID: Oid = Oid::new(1249);

/// Attribute numbers of `bp_class`.
pub mod class_columns {
    use super::AttrNumber;

    pub const RELNAME: AttrNumber = 1;
    pub const RELFILENODE: AttrNumber = 2;
}

/// Attribute numbers of `bp_attribute`.
pub mod attribute_columns {
    use super::AttrNumber;

    pub const ATTRELID: AttrNumber = 1;
    pub const ATTNAME: AttrNumber = 2;
    pub const ATTNUM: AttrNumber = 3;
    pub const ATTTYPID: AttrNumber = 4;
}

pub static CLASS_TUPLE_DESC: LazyLock<Arc<TupleDesc>> = LazyLock::new(|| {
    Arc::new(TupleDesc::new(
        vec![
            Attribute::new("relname", Oid::NAME_TYPE).expect("bootstrap descriptor"),
            Attribute::new("relfilenode", Oid::OID_TYPE).expect("bootstrap descriptor"),
        ],
        CLASS_REL_ID,
        true,
    ))
});

pub static ATTRIBUTE_TUPLE_DESC: LazyLock<Arc<TupleDesc>> = LazyLock::new(|| {
    Arc::new(TupleDesc::new(
        vec![
            Attribute::new("attrelid", Oid::OID_TYPE).expect("bootstrap descriptor"),
            Attribute::new("attname", Oid::NAME_TYPE).expect("bootstrap descriptor"),
            Attribute::new("attnum", Oid::INT4_TYPE).expect("bootstrap descriptor"),
            Attribute::new("atttypid", Oid::OID_TYPE).expect("bootstrap descriptor"),
        ],
        ATTRIBUTE_REL_ID,
        false,
    ))
});
