//! # Typed Value Layer
//!
//! A [`Datum`] is one value of the storage core's closed type set. Each
//! variant has a fixed-width little-endian binary form (the private format
//! written inside heap tuples) and a text form (the format accepted from
//! and rendered to the outside).
//!
//! | Variant | Type oid | Wire form |
//! |---------|----------|-----------|
//! | `Oid`   | 26       | 4 B LE    |
//! | `Int4`  | 23       | 4 B LE    |
//! | `Name`  | 19       | 64 B, NUL-terminated |
//! | `Tid`   | 27       | 4 B LE block ++ 2 B LE offset |
//! | `Xid`   | 28       | 4 B LE    |
//!
//! Text-form failures are reported as `InvalidTextRepresentation`; binary
//! decode failures mean a corrupt page and are reported as internal
//! errors.
//!
//! SQL null is represented as the absence of a datum (`Option<Datum>`),
//! not as a variant.

mod name;
mod registry;

pub use name::Name;
pub use registry::{type_info, TypeInfo};

use crate::system::{ItemPointer, Oid, StoreError, Xid, ITEM_POINTER_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Oid(Oid),
    Int4(i32),
    Name(Name),
    Tid(ItemPointer),
    Xid(Xid),
}

impl Datum {
    pub fn type_id(&self) -> Oid {
        match self {
            Datum::Oid(_) => Oid::OID_TYPE,
            Datum::Int4(_) => Oid::INT4_TYPE,
            Datum::Name(_) => Oid::NAME_TYPE,
            Datum::Tid(_) => Oid::TID_TYPE,
            Datum::Xid(_) => Oid::XID_TYPE,
        }
    }

    /// On-disk width of this value.
    pub fn wire_len(&self) -> usize {
        match self {
            Datum::Oid(_) | Datum::Int4(_) | Datum::Xid(_) => 4,
            Datum::Name(_) => crate::config::NAME_LEN,
            Datum::Tid(_) => ITEM_POINTER_LEN,
        }
    }

    /// Appends the binary form to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Datum::Oid(oid) => out.extend_from_slice(&oid.as_u32().to_le_bytes()),
            Datum::Int4(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Name(name) => name.encode(out),
            Datum::Tid(tid) => tid.encode(out),
            Datum::Xid(xid) => out.extend_from_slice(&xid.as_u32().to_le_bytes()),
        }
    }

    /// Decodes one value of type `typid` from the front of `bytes`.
    pub fn decode(typid: Oid, bytes: &[u8]) -> eyre::Result<Datum> {
        let info = type_info(typid)?;
        if bytes.len() < info.wire_len() {
            return Err(StoreError::internal(format!(
                "datum of type {} truncated: {} bytes left, {} needed",
                info.name,
                bytes.len(),
                info.wire_len()
            ))
            .into());
        }
        let datum = match typid {
            Oid::OID_TYPE => Datum::Oid(Oid::new(u32::from_le_bytes(
                bytes[0..4].try_into().unwrap(),
            ))),
            Oid::INT4_TYPE => Datum::Int4(i32::from_le_bytes(bytes[0..4].try_into().unwrap())),
            Oid::NAME_TYPE => Datum::Name(Name::decode(bytes)?),
            Oid::TID_TYPE => Datum::Tid(ItemPointer::decode(bytes)?),
            Oid::XID_TYPE => Datum::Xid(Xid::new(u32::from_le_bytes(
                bytes[0..4].try_into().unwrap(),
            ))),
            _ => unreachable!("registry accepted oid {typid}"),
        };
        Ok(datum)
    }

    /// Parses the text form of a value of type `typid`.
    pub fn from_text(typid: Oid, text: &str) -> eyre::Result<Datum> {
        type_info(typid)?;
        let syntax = || StoreError::invalid_text("invalid syntax");
        let datum = match typid {
            Oid::OID_TYPE => Datum::Oid(Oid::new(text.parse::<u32>().map_err(|_| syntax())?)),
            Oid::INT4_TYPE => Datum::Int4(text.parse::<i32>().map_err(|_| syntax())?),
            Oid::NAME_TYPE => Datum::Name(Name::new(text)?),
            Oid::TID_TYPE => Datum::Tid(text.parse::<ItemPointer>()?),
            Oid::XID_TYPE => Datum::Xid(Xid::new(text.parse::<u32>().map_err(|_| syntax())?)),
            _ => unreachable!("registry accepted oid {typid}"),
        };
        Ok(datum)
    }

    /// Renders the text form.
    pub fn to_text(&self) -> String {
        match self {
            Datum::Oid(oid) => oid.to_string(),
            Datum::Int4(v) => v.to_string(),
            Datum::Name(name) => name.to_string(),
            Datum::Tid(tid) => tid.to_string(),
            Datum::Xid(xid) => xid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NAME_LEN;
    use crate::system::ErrorCode;

    fn code_of(report: &eyre::Report) -> ErrorCode {
        report.downcast_ref::<StoreError>().unwrap().code()
    }

    #[test]
    fn oid_text_round_trip() {
        let datum = Datum::from_text(Oid::OID_TYPE, "42").unwrap();
        assert_eq!(datum, Datum::Oid(Oid::new(42)));
        assert_eq!(datum.to_text(), "42");
    }

    #[test]
    fn negative_oid_text_is_rejected() {
        let err = Datum::from_text(Oid::OID_TYPE, "-1").unwrap_err();
        assert_eq!(code_of(&err), ErrorCode::InvalidTextRepresentation);
        assert_eq!(err.to_string(), "invalid syntax");
    }

    #[test]
    fn malformed_tid_text_is_rejected() {
        let err = Datum::from_text(Oid::TID_TYPE, "(1,)").unwrap_err();
        assert_eq!(code_of(&err), ErrorCode::InvalidTextRepresentation);
        assert_eq!(err.to_string(), "invalid syntax for tid");
    }

    #[test]
    fn name_binary_round_trip() {
        let mut bytes = vec![b'a', b'b', b'c', 0x00, b'd'];
        bytes.resize(NAME_LEN, 0);
        let datum = Datum::decode(Oid::NAME_TYPE, &bytes).unwrap();
        assert_eq!(datum, Datum::Name(Name::new("abc").unwrap()));

        let mut out = Vec::new();
        datum.encode(&mut out);
        assert_eq!(out.len(), NAME_LEN);
        assert_eq!(&out[..4], b"abc\0");
    }

    #[test]
    fn int4_binary_round_trip() {
        let mut out = Vec::new();
        Datum::Int4(-7).encode(&mut out);
        assert_eq!(out, (-7i32).to_le_bytes());
        assert_eq!(Datum::decode(Oid::INT4_TYPE, &out).unwrap(), Datum::Int4(-7));
    }

    #[test]
    fn tid_binary_layout_is_block_then_offset() {
        let mut out = Vec::new();
        Datum::Tid(ItemPointer::new(1, 30)).encode(&mut out);
        assert_eq!(out, [1, 0, 0, 0, 30, 0]);
    }

    #[test]
    fn truncated_datum_is_corrupt() {
        let err = Datum::decode(Oid::INT4_TYPE, &[1, 2]).unwrap_err();
        assert_eq!(code_of(&err), ErrorCode::InternalError);
    }

    #[test]
    fn wire_len_matches_registry() {
        for datum in [
            Datum::Oid(Oid::new(1)),
            Datum::Int4(1),
            Datum::Name(Name::new("n").unwrap()),
            Datum::Tid(ItemPointer::new(0, 1)),
            Datum::Xid(Xid::new(3)),
        ] {
            let info = type_info(datum.type_id()).unwrap();
            assert_eq!(datum.wire_len(), info.wire_len());
        }
    }
}
