//! # Cell Codecs
//!
//! This module defines the wire format of the three cell variants stored
//! inside slotted pages. A cell is the byte run referred to by one slot
//! pointer; which variant a page holds is decided by the caller (leaf
//! index pages hold leaf cells, intermediate index pages hold intermediate
//! cells, heap pages hold record cells), so dispatch is always known at
//! the call site and the variants share a minimal contract: `key`,
//! `payload_size`, `kind`, `encode`.
//!
//! ## Wire Formats
//!
//! Every cell begins with a one-byte flag; bit 0 set marks the cell
//! *invalid* (logically deleted, bytes retained). The body follows the
//! flag, all integers little-endian:
//!
//! ```text
//! Leaf cell (index leaf -> record reference), 11 bytes:
//! +------+----------+--------------+---------+--------+
//! | flag | key_size | heap_page_id | slot_id |  key   |
//! | 1B   | u16      | u16          | u16     | i32    |
//! +------+----------+--------------+---------+--------+
//!
//! Intermediate cell (index internal -> child pointer), 9 bytes:
//! +------+----------+---------------+--------+
//! | flag | key_size | child_page_id |  key   |
//! | 1B   | u16      | u16           | i32    |
//! +------+----------+---------------+--------+
//!
//! Record cell (heap -> actual value), 13 + N bytes:
//! +------+--------+------------+-----------+
//! | flag |  key   | value_size |   value   |
//! | 1B   | i32    | u64        | N bytes   |
//! +------+--------+------------+-----------+
//! ```
//!
//! `key_size` records the width of the key (always 4 today); it is decoded
//! but not yet interpreted, leaving room for variable-width keys.
//!
//! ## Contract
//!
//! `encode` produces exactly `payload_size()` bytes with a cleared flag.
//! `decode` reads a cell *body* -- the caller inspects the flag byte first
//! via [`is_valid`] and skips it. Codecs do not validate content; a slot
//! pointing at garbage yields garbage fields, which is why every scan must
//! consult the validity flag before decoding.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I32, U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Flag byte preceding every cell body.
pub const CELL_FLAG_SIZE: usize = 1;
/// Bit 0 of the flag byte: the cell has been invalidated.
pub const FLAG_INVALID: u8 = 0x01;

/// Encoded size of a leaf cell, flag included.
pub const LEAF_CELL_SIZE: usize = CELL_FLAG_SIZE + size_of::<LeafCell>();
/// Encoded size of an intermediate cell, flag included.
pub const INTERMEDIATE_CELL_SIZE: usize = CELL_FLAG_SIZE + size_of::<IntermediateCell>();
/// Encoded size of a record cell before its value bytes, flag included.
pub const RECORD_CELL_FIXED_SIZE: usize = CELL_FLAG_SIZE + size_of::<RecordCellHeader>();

const _: () = assert!(LEAF_CELL_SIZE == 11);
const _: () = assert!(INTERMEDIATE_CELL_SIZE == 9);
const _: () = assert!(RECORD_CELL_FIXED_SIZE == 13);

/// Returns true when the cell starting at `cell` carries no invalid flag.
pub fn is_valid(cell: &[u8]) -> bool {
    cell[0] & FLAG_INVALID == 0
}

/// Sets the invalid flag on the cell starting at `cell`. The body bytes
/// stay in place; scans skip the cell from now on.
pub fn mark_invalid(cell: &mut [u8]) {
    cell[0] |= FLAG_INVALID;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Leaf,
    Intermediate,
    Record,
}

/// Body of a leaf cell: references a record by `(heap_page_id, slot_id)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LeafCell {
    key_size: U16,
    heap_page_id: U16,
    slot_id: U16,
    key: I32,
}

impl LeafCell {
    pub fn new(key: i32, heap_page_id: u16, slot_id: u16) -> Self {
        Self {
            key_size: U16::new(size_of::<I32>() as u16),
            heap_page_id: U16::new(heap_page_id),
            slot_id: U16::new(slot_id),
            key: I32::new(key),
        }
    }

    /// Decodes a leaf cell body (the bytes after the flag).
    pub fn decode(body: &[u8]) -> Result<Self> {
        ensure!(
            body.len() >= size_of::<Self>(),
            "cell body too small for LeafCell: {} < {}",
            body.len(),
            size_of::<Self>()
        );
        Self::read_from_bytes(&body[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to decode LeafCell: {:?}", e))
    }

    pub fn key(&self) -> i32 {
        self.key.get()
    }

    pub fn key_size(&self) -> u16 {
        self.key_size.get()
    }

    pub fn heap_page_id(&self) -> u16 {
        self.heap_page_id.get()
    }

    pub fn slot_id(&self) -> u16 {
        self.slot_id.get()
    }
}

/// Body of an intermediate cell: routes keys `<=` its key to a child page.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IntermediateCell {
    key_size: U16,
    child_page_id: U16,
    key: I32,
}

impl IntermediateCell {
    pub fn new(key: i32, child_page_id: u16) -> Self {
        Self {
            key_size: U16::new(size_of::<I32>() as u16),
            child_page_id: U16::new(child_page_id),
            key: I32::new(key),
        }
    }

    /// Decodes an intermediate cell body (the bytes after the flag).
    pub fn decode(body: &[u8]) -> Result<Self> {
        ensure!(
            body.len() >= size_of::<Self>(),
            "cell body too small for IntermediateCell: {} < {}",
            body.len(),
            size_of::<Self>()
        );
        Self::read_from_bytes(&body[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to decode IntermediateCell: {:?}", e))
    }

    pub fn key(&self) -> i32 {
        self.key.get()
    }

    pub fn key_size(&self) -> u16 {
        self.key_size.get()
    }

    pub fn child_page_id(&self) -> u16 {
        self.child_page_id.get()
    }
}

/// Fixed prelude of a record cell body; the value bytes follow it.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct RecordCellHeader {
    key: I32,
    value_size: U64,
}

/// A record cell borrowing its value bytes, either from the caller (when
/// encoding) or from the page (when decoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCell<'a> {
    key: i32,
    value: &'a [u8],
}

impl<'a> RecordCell<'a> {
    pub fn new(key: i32, value: &'a [u8]) -> Self {
        Self { key, value }
    }

    /// Decodes a record cell body; the returned value slice points into
    /// `body`, no bytes are copied.
    pub fn decode(body: &'a [u8]) -> Result<Self> {
        let fixed = size_of::<RecordCellHeader>();
        ensure!(
            body.len() >= fixed,
            "cell body too small for RecordCell: {} < {}",
            body.len(),
            fixed
        );
        let header = RecordCellHeader::read_from_bytes(&body[..fixed])
            .map_err(|e| eyre::eyre!("failed to decode RecordCell: {:?}", e))?;
        let value_size = header.value_size.get() as usize;
        ensure!(
            body.len() >= fixed + value_size,
            "record value extends beyond cell bounds: {} + {} > {}",
            fixed,
            value_size,
            body.len()
        );
        Ok(Self {
            key: header.key.get(),
            value: &body[fixed..fixed + value_size],
        })
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    pub fn value_size(&self) -> u64 {
        self.value.len() as u64
    }
}

/// Tagged cell variant with the shared codec contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    Leaf(LeafCell),
    Intermediate(IntermediateCell),
    Record(RecordCell<'a>),
}

impl Cell<'_> {
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Leaf(_) => CellKind::Leaf,
            Cell::Intermediate(_) => CellKind::Intermediate,
            Cell::Record(_) => CellKind::Record,
        }
    }

    pub fn key(&self) -> i32 {
        match self {
            Cell::Leaf(c) => c.key(),
            Cell::Intermediate(c) => c.key(),
            Cell::Record(c) => c.key(),
        }
    }

    /// Encoded size, flag byte included.
    pub fn payload_size(&self) -> usize {
        match self {
            Cell::Leaf(_) => LEAF_CELL_SIZE,
            Cell::Intermediate(_) => INTERMEDIATE_CELL_SIZE,
            Cell::Record(c) => RECORD_CELL_FIXED_SIZE + c.value.len(),
        }
    }

    /// Encodes the cell to exactly `payload_size()` bytes. The flag byte
    /// is cleared: a freshly written cell is valid.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.payload_size()];
        match self {
            Cell::Leaf(c) => buffer[CELL_FLAG_SIZE..].copy_from_slice(c.as_bytes()),
            Cell::Intermediate(c) => buffer[CELL_FLAG_SIZE..].copy_from_slice(c.as_bytes()),
            Cell::Record(c) => {
                let header = RecordCellHeader {
                    key: I32::new(c.key),
                    value_size: U64::new(c.value.len() as u64),
                };
                buffer[CELL_FLAG_SIZE..RECORD_CELL_FIXED_SIZE].copy_from_slice(header.as_bytes());
                buffer[RECORD_CELL_FIXED_SIZE..].copy_from_slice(c.value);
            }
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_cell_round_trip() {
        let original = LeafCell::new(11111, 999, 15);
        let encoded = Cell::Leaf(original).encode();

        assert_eq!(encoded.len(), LEAF_CELL_SIZE);
        assert!(is_valid(&encoded));

        let decoded = LeafCell::decode(&encoded[CELL_FLAG_SIZE..]).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.key(), 11111);
        assert_eq!(decoded.heap_page_id(), 999);
        assert_eq!(decoded.slot_id(), 15);
        assert_eq!(decoded.key_size(), 4);
    }

    #[test]
    fn intermediate_cell_round_trip() {
        let original = IntermediateCell::new(77777, 500);
        let encoded = Cell::Intermediate(original).encode();

        assert_eq!(encoded.len(), INTERMEDIATE_CELL_SIZE);

        let decoded = IntermediateCell::decode(&encoded[CELL_FLAG_SIZE..]).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.key(), 77777);
        assert_eq!(decoded.child_page_id(), 500);
    }

    #[test]
    fn record_cell_round_trip() {
        let payload = b"page-record";
        let original = RecordCell::new(-42, payload);
        let encoded = Cell::Record(original).encode();

        assert_eq!(encoded.len(), RECORD_CELL_FIXED_SIZE + payload.len());

        let decoded = RecordCell::decode(&encoded[CELL_FLAG_SIZE..]).unwrap();
        assert_eq!(decoded.key(), -42);
        assert_eq!(decoded.value(), payload);
        assert_eq!(decoded.value_size(), payload.len() as u64);
    }

    #[test]
    fn record_cell_empty_value() {
        let original = RecordCell::new(7, b"");
        let encoded = Cell::Record(original).encode();

        assert_eq!(encoded.len(), RECORD_CELL_FIXED_SIZE);

        let decoded = RecordCell::decode(&encoded[CELL_FLAG_SIZE..]).unwrap();
        assert_eq!(decoded.value(), b"");
    }

    #[test]
    fn cell_kind_and_key_dispatch() {
        let leaf = Cell::Leaf(LeafCell::new(1, 2, 3));
        let intermediate = Cell::Intermediate(IntermediateCell::new(2, 9));
        let record = Cell::Record(RecordCell::new(3, b"v"));

        assert_eq!(leaf.kind(), CellKind::Leaf);
        assert_eq!(intermediate.kind(), CellKind::Intermediate);
        assert_eq!(record.kind(), CellKind::Record);

        assert_eq!(leaf.key(), 1);
        assert_eq!(intermediate.key(), 2);
        assert_eq!(record.key(), 3);
    }

    #[test]
    fn invalid_flag_round_trip() {
        let mut encoded = Cell::Leaf(LeafCell::new(1, 1, 1)).encode();

        assert!(is_valid(&encoded));
        mark_invalid(&mut encoded);
        assert!(!is_valid(&encoded));

        // the body is untouched
        let decoded = LeafCell::decode(&encoded[CELL_FLAG_SIZE..]).unwrap();
        assert_eq!(decoded.key(), 1);
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let encoded = Cell::Leaf(LeafCell::new(5, 5, 5)).encode();
        let result = LeafCell::decode(&encoded[CELL_FLAG_SIZE..LEAF_CELL_SIZE - 2]);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("too small"));
    }

    #[test]
    fn record_decode_rejects_oversized_value_length() {
        let mut encoded = Cell::Record(RecordCell::new(1, b"abc")).encode();
        // corrupt value_size to claim more bytes than the body holds
        encoded[5..13].copy_from_slice(&u64::MAX.to_le_bytes());

        let result = RecordCell::decode(&encoded[CELL_FLAG_SIZE..]);
        assert!(result.is_err());
    }
}
