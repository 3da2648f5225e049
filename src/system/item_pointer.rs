//! Item pointers (tuple identifiers).
//!
//! An item pointer names one tuple version by the block it lives on and
//! the line pointer slot that addresses it within the page. The 6-byte
//! on-disk form is the block number followed by the offset number, both
//! little-endian. Its text form is `(block,offset)`.

use std::fmt;
use std::str::FromStr;

use crate::system::error::StoreError;
use crate::system::ids::{BlockNumber, OffsetNumber, INVALID_OFFSET_NUMBER};

/// On-disk width: 4-byte block number plus 2-byte offset number.
pub const ITEM_POINTER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemPointer {
    pub block: BlockNumber,
    pub offset: OffsetNumber,
}

pub const INVALID_ITEM_POINTER: ItemPointer = ItemPointer {
    block: 0,
    offset: INVALID_OFFSET_NUMBER,
};

impl ItemPointer {
    pub fn new(block: BlockNumber, offset: OffsetNumber) -> Self {
        Self { block, offset }
    }

    pub fn is_valid(self) -> bool {
        self.offset != INVALID_OFFSET_NUMBER
    }

    pub fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.block.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }

    pub fn decode(bytes: &[u8]) -> eyre::Result<Self> {
        if bytes.len() < ITEM_POINTER_LEN {
            return Err(StoreError::internal("tid datum truncated").into());
        }
        let block = BlockNumber::from_le_bytes(bytes[0..4].try_into().unwrap());
        let offset = OffsetNumber::from_le_bytes(bytes[4..6].try_into().unwrap());
        Ok(Self { block, offset })
    }
}

impl fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.block, self.offset)
    }
}

impl FromStr for ItemPointer {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, StoreError> {
        let syntax = || StoreError::invalid_text("invalid syntax for tid");
        let inner = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(syntax)?;
        let (block_str, offset_str) = inner.split_once(',').ok_or_else(syntax)?;
        let block: BlockNumber = block_str.trim().parse().map_err(|_| syntax())?;
        let offset: OffsetNumber = offset_str.trim().parse().map_err(|_| syntax())?;
        Ok(ItemPointer { block, offset })
    }
}
