//! The fixed-width `name` type.
//!
//! Identifiers (relation names, attribute names) are stored in exactly 64
//! bytes on disk: the value's UTF-8 bytes, a terminating NUL, and
//! unspecified padding. The terminator is mandatory, so a value holds at
//! most 63 bytes.

use std::fmt;

use crate::config::NAME_LEN;
use crate::system::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name(String);

impl Name {
    pub fn new(value: impl Into<String>) -> eyre::Result<Self> {
        let value = value.into();
        if value.len() >= NAME_LEN {
            return Err(StoreError::invalid_text("value too long").into());
        }
        if value.as_bytes().contains(&0) {
            return Err(StoreError::invalid_text("name must not contain NUL bytes").into());
        }
        Ok(Name(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends the 64-byte on-disk form: value bytes, NUL, zero padding.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + NAME_LEN, 0);
        out[start..start + self.0.len()].copy_from_slice(self.0.as_bytes());
    }

    /// Decodes the 64-byte on-disk form. The value ends at the first NUL;
    /// a name with no terminator is corrupt.
    pub fn decode(bytes: &[u8]) -> eyre::Result<Self> {
        if bytes.len() < NAME_LEN {
            return Err(StoreError::internal("name datum truncated").into());
        }
        let end = bytes[..NAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| StoreError::internal("name datum has no NUL terminator"))?;
        let value = std::str::from_utf8(&bytes[..end])
            .map_err(|_| StoreError::internal("name datum is not valid utf-8"))?;
        Ok(Name(value.to_owned()))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stops_at_first_nul() {
        let mut bytes = vec![b'a', b'b', b'c', 0x00, b'd'];
        bytes.resize(NAME_LEN, 0);
        assert_eq!(Name::decode(&bytes).unwrap(), "abc");
    }

    #[test]
    fn encode_pads_to_name_len() {
        let mut out = Vec::new();
        Name::new("abc").unwrap().encode(&mut out);
        assert_eq!(out.len(), NAME_LEN);
        assert_eq!(&out[..4], b"abc\0");
        assert!(out[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_value_with_no_room_for_terminator() {
        let long = "x".repeat(NAME_LEN);
        assert!(Name::new(long).is_err());
        assert!(Name::new("x".repeat(NAME_LEN - 1)).is_ok());
    }

    #[test]
    fn unterminated_name_is_corrupt() {
        let bytes = [b'x'; NAME_LEN];
        assert!(Name::decode(&bytes).is_err());
    }
}
