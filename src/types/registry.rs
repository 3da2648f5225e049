//! Per-type metadata registry.
//!
//! The storage core speaks a small closed set of fixed-width wire types.
//! The registry maps a type oid to its metadata; lookups for any other oid
//! mean the catalog or a tuple header is corrupt.

use phf::phf_map;

use crate::system::{Oid, StoreError};

/// Metadata for one wire type. `len` is the on-disk width in bytes;
/// negative widths are reserved for variable-length representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: Oid,
    pub name: &'static str,
    pub len: i16,
}

impl TypeInfo {
    #[inline]
    pub fn is_varlen(&self) -> bool {
        self.len < 0
    }

    /// On-disk width of a fixed-width type.
    #[inline]
    pub fn wire_len(&self) -> usize {
        debug_assert!(!self.is_varlen());
        self.len as usize
    }
}

static TYPE_REGISTRY: phf::Map<u32, TypeInfo> = phf_map! {
    19u32 => TypeInfo { id: Oid::NAME_TYPE, name: "name", len: 64 },
    23u32 => TypeInfo { id: Oid::INT4_TYPE, name: "int4", len: 4 },
    26u32 => TypeInfo { id: Oid::OID_TYPE, name: "oid", len: 4 },
    27u32 => TypeInfo { id: Oid::TID_TYPE, name: "tid", len: 6 },
    28u32 => TypeInfo { id: Oid::XID_TYPE, name: "xid", len: 4 },
};

/// Looks up the registry entry for a type oid.
pub fn type_info(typid: Oid) -> eyre::Result<&'static TypeInfo> {
    TYPE_REGISTRY
        .get(&typid.as_u32())
        .ok_or_else(|| StoreError::internal(format!("unknown type oid {typid}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_the_wire_types() {
        for (oid, name, len) in [
            (Oid::NAME_TYPE, "name", 64),
            (Oid::INT4_TYPE, "int4", 4),
            (Oid::OID_TYPE, "oid", 4),
            (Oid::TID_TYPE, "tid", 6),
            (Oid::XID_TYPE, "xid", 4),
        ] {
            let info = type_info(oid).unwrap();
            assert_eq!(info.id, oid);
            assert_eq!(info.name, name);
            assert_eq!(info.len, len);
            assert!(!info.is_varlen());
        }
    }

    #[test]
    fn unknown_type_oid_is_an_error() {
        assert!(type_info(Oid::new(424242)).is_err());
        // text is a known oid but not a storable wire type here
        assert!(type_info(Oid::TEXT_TYPE).is_err());
    }
}
