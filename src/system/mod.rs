//! System-wide primitives: fixed-width identifiers, transaction-id
//! ordering, alignment helpers, relation file path resolution, and the
//! crate's typed error.

mod error;
mod ids;
mod item_pointer;
mod relpath;
mod xid;

pub use error::{ErrorCode, StoreError};
pub use ids::{
    max_align, type_align, AttrNumber, BlockNumber, Oid, OffsetNumber, CMAX_ATTR_NUMBER,
    CMIN_ATTR_NUMBER, CTID_ATTR_NUMBER, FIRST_OFFSET_NUMBER, INVALID_BLOCK_NUMBER,
    INVALID_OFFSET_NUMBER, MAX_BLOCK_NUMBER, MAX_OFFSET_NUMBER, OID_ATTR_NUMBER,
    TABLE_OID_ATTR_NUMBER, XMAX_ATTR_NUMBER, XMIN_ATTR_NUMBER,
};
pub use item_pointer::{ItemPointer, INVALID_ITEM_POINTER, ITEM_POINTER_LEN};
pub use relpath::{rel_path, RelFileNode, DEFAULT_TABLESPACE_OID, GLOBAL_TABLESPACE_OID};
pub use xid::Xid;
