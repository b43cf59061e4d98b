//! # Slotted Page View
//!
//! This module implements the slotted-page layout over a caller-owned
//! 4096-byte frame. A page is either a leaf or an intermediate node of an
//! index file, or a heap page of record cells; the layout is identical,
//! only the cell variant differs.
//!
//! ## Page Layout
//!
//! ```text
//! Offset  Size   Field
//! ------  ----   ---------------------------------------------
//! 0       1      is_leaf flag (1 = leaf, 0 = intermediate)
//! 1       1      slot count
//! 2       2      cell_start: offset of the downward cell heap
//! 4       2      rightmost-child page id (intermediate only)
//! 6       250    reserved up to the 256-byte node header
//! 256     2*N    slot pointer array (u16 LE, insertion order)
//! ...            free space
//! cell_start     cells, growing down from the end of the page
//! ```
//!
//! ```text
//! +----------------------+
//! | Node header (256B)   |
//! +----------------------+
//! | Slot pointers        |  <- grows upward from offset 256
//! +----------------------+
//! | Free space           |
//! +----------------------+
//! | Cells                |  <- grows downward from offset 4096
//! +----------------------+
//! ```
//!
//! Slot pointers are appended in insertion order, so slot order is not key
//! order; intermediate-page routing sorts the decoded cells on every call.
//! An invalidated slot keeps its pointer and its cell bytes; scans skip it
//! via the cell's flag byte. Freed space is never reclaimed.
//!
//! ## Capacity
//!
//! An insert fails (returns `None`) when the new cell would collide with
//! the slot pointer array: `cell_start - payload <= 256 + 2*(count+1)`.
//! Callers surface this as a terminal "page full" condition; splits are
//! not implemented.
//!
//! ## Dirty Tracking
//!
//! The page view borrows a `dirty` flag owned by the buffer pool's frame
//! directory. Every mutation sets it; only write-back clears it. A page
//! wrapped after loading from disk starts clean.

use eyre::{ensure, Result};
use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::cell::{self, Cell, IntermediateCell, LeafCell, RecordCell, CELL_FLAG_SIZE};
use super::{CELL_POINTER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};

/// Meaningful prefix of the 256-byte node header region.
pub const NODE_HEADER_SIZE: usize = size_of::<NodeHeader>();

const _: () = assert!(NODE_HEADER_SIZE == 6);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    is_leaf: u8,
    slot_count: u8,
    cell_start: U16,
    rightmost_child: U16,
}

/// Typed view over one page-sized frame.
///
/// Constructed with [`Page::init`] for a fresh frame or [`Page::wrap`] for
/// an already formatted one; both borrow the frame bytes and the frame's
/// dirty flag for the lifetime of the view, so the borrow checker rules
/// out holding a page across an eviction.
#[derive(Debug)]
pub struct Page<'a> {
    data: &'a mut [u8],
    dirty: &'a mut bool,
}

impl<'a> Page<'a> {
    /// Formats `data` as an empty node and returns the view. The dirty
    /// flag is left untouched: freshly initialized pages are written out
    /// by eviction only once something lands in them.
    pub fn init(
        data: &'a mut [u8],
        dirty: &'a mut bool,
        is_leaf: bool,
        rightmost_child: u16,
    ) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = NodeHeader::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to write NodeHeader: {:?}", e))?;
        header.is_leaf = is_leaf as u8;
        header.slot_count = 0;
        header.cell_start = U16::new(PAGE_SIZE as u16);
        header.rightmost_child = U16::new(rightmost_child);

        Ok(Self { data, dirty })
    }

    /// Wraps an already formatted frame.
    pub fn wrap(data: &'a mut [u8], dirty: &'a mut bool) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        Ok(Self { data, dirty })
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::ref_from_bytes(&self.data[..NODE_HEADER_SIZE]).unwrap() // INVARIANT: length checked in the constructors
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        NodeHeader::mut_from_bytes(&mut self.data[..NODE_HEADER_SIZE]).unwrap() // INVARIANT: length checked in the constructors
    }

    pub fn is_leaf(&self) -> bool {
        self.header().is_leaf == 1
    }

    pub fn slot_count(&self) -> u16 {
        self.header().slot_count as u16
    }

    /// Offset of the downward cell heap; equals `PAGE_SIZE` when empty.
    pub fn cell_start(&self) -> u16 {
        self.header().cell_start.get()
    }

    /// Child page taken when a search key exceeds every stored key.
    /// Meaningful only for intermediate nodes.
    pub fn rightmost_child(&self) -> u16 {
        self.header().rightmost_child.get()
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty
    }

    pub fn mark_dirty(&mut self) {
        *self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        *self.dirty = false;
    }

    /// Resolves a slot id to its cell offset within the page.
    fn cell_offset(&self, slot_id: u16) -> Result<usize> {
        ensure!(
            slot_id < self.slot_count(),
            "slot {} out of bounds (slot_count={})",
            slot_id,
            self.slot_count()
        );

        let pointer = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * slot_id as usize;
        let offset =
            u16::from_le_bytes([self.data[pointer], self.data[pointer + 1]]) as usize;
        ensure!(
            offset + CELL_FLAG_SIZE <= PAGE_SIZE,
            "cell offset {} beyond page boundary",
            offset
        );
        Ok(offset)
    }

    /// Appends a cell and returns its slot id, or `None` when the cell
    /// heap would collide with the slot pointer array. Slot pointers are
    /// appended in insertion order.
    pub fn insert_cell(&mut self, cell: &Cell<'_>) -> Option<u16> {
        let slot_count = self.slot_count() as usize;
        if slot_count >= u8::MAX as usize {
            return None;
        }

        let payload = cell.payload_size();
        let new_offset = (self.cell_start() as usize).checked_sub(payload)?;
        let directory_end = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * (slot_count + 1);
        if new_offset <= directory_end {
            return None;
        }

        let encoded = cell.encode();
        self.data[new_offset..new_offset + payload].copy_from_slice(&encoded);

        let pointer = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * slot_count;
        self.data[pointer..pointer + CELL_POINTER_SIZE]
            .copy_from_slice(&(new_offset as u16).to_le_bytes());

        let header = self.header_mut();
        header.slot_count += 1;
        header.cell_start = U16::new(new_offset as u16);
        self.mark_dirty();

        Some(slot_count as u16)
    }

    /// Sets the invalid flag on a slot's cell. The pointer and the cell
    /// bytes stay; no space is reclaimed.
    pub fn invalidate_slot(&mut self, slot_id: u16) -> Result<()> {
        let offset = self.cell_offset(slot_id)?;
        cell::mark_invalid(&mut self.data[offset..]);
        self.mark_dirty();
        Ok(())
    }

    /// Scans a leaf page for `key` and returns the referenced
    /// `(heap_page_id, slot_id)`. When `do_invalidate` is set, the matched
    /// slot is invalidated before returning.
    pub fn find_leaf_ref(&mut self, key: i32, do_invalidate: bool) -> Result<Option<(u16, u16)>> {
        ensure!(
            self.is_leaf(),
            "find_leaf_ref called on an intermediate node"
        );

        for slot_id in 0..self.slot_count() {
            let offset = self.cell_offset(slot_id)?;
            if !cell::is_valid(&self.data[offset..]) {
                continue;
            }
            let leaf = LeafCell::decode(&self.data[offset + CELL_FLAG_SIZE..])?;
            if leaf.key() == key {
                if do_invalidate {
                    cell::mark_invalid(&mut self.data[offset..]);
                    self.mark_dirty();
                }
                return Ok(Some((leaf.heap_page_id(), leaf.slot_id())));
            }
        }
        Ok(None)
    }

    /// True when any valid leaf cell carries `key`.
    pub fn has_key(&self, key: i32) -> Result<bool> {
        ensure!(self.is_leaf(), "has_key called on an intermediate node");

        for slot_id in 0..self.slot_count() {
            let offset = self.cell_offset(slot_id)?;
            if !cell::is_valid(&self.data[offset..]) {
                continue;
            }
            if LeafCell::decode(&self.data[offset + CELL_FLAG_SIZE..])?.key() == key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Routes a search key to a child page: the child of the smallest
    /// stored key `>=` the search key, or the rightmost child when every
    /// stored key is smaller. Cells are sorted on every call because slot
    /// order is insertion order, not key order.
    pub fn find_child_page(&self, key: i32) -> Result<u16> {
        ensure!(!self.is_leaf(), "find_child_page called on a leaf node");

        let mut cells = Vec::with_capacity(self.slot_count() as usize);
        for slot_id in 0..self.slot_count() {
            let offset = self.cell_offset(slot_id)?;
            if !cell::is_valid(&self.data[offset..]) {
                continue;
            }
            cells.push(IntermediateCell::decode(&self.data[offset + CELL_FLAG_SIZE..])?);
        }
        cells.sort_by_key(IntermediateCell::key);

        Ok(cells
            .iter()
            .find(|c| c.key() >= key)
            .map(|c| c.child_page_id())
            .unwrap_or_else(|| self.rightmost_child()))
    }

    /// Value bytes of a record cell, skipping flag, key, and value size.
    /// Fails when the slot has been invalidated.
    pub fn value_bytes(&self, slot_id: u16) -> Result<&[u8]> {
        let offset = self.cell_offset(slot_id)?;
        ensure!(
            cell::is_valid(&self.data[offset..]),
            "slot {} holds an invalidated cell",
            slot_id
        );
        let record = RecordCell::decode(&self.data[offset + CELL_FLAG_SIZE..])?;
        Ok(record.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cell::{Cell, IntermediateCell, LeafCell, RecordCell};

    fn leaf(key: i32, heap_page_id: u16, slot_id: u16) -> Cell<'static> {
        Cell::Leaf(LeafCell::new(key, heap_page_id, slot_id))
    }

    #[test]
    fn init_writes_empty_header() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let page = Page::init(&mut data, &mut dirty, true, 7).unwrap();

        assert!(page.is_leaf());
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.cell_start(), PAGE_SIZE as u16);
        assert_eq!(page.rightmost_child(), 7);
        assert!(!page.is_dirty());
    }

    #[test]
    fn init_rejects_wrong_frame_size() {
        let mut data = [0u8; 100];
        let mut dirty = false;
        let result = Page::init(&mut data, &mut dirty, true, 0);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid page size"));
    }

    #[test]
    fn insert_leaf_cells_and_find() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        let entries = [(11111, 999u16, 15u16), (22222, 500, 2), (33333, 123, 7)];
        for (i, &(key, heap_page_id, slot_id)) in entries.iter().enumerate() {
            let assigned = page.insert_cell(&leaf(key, heap_page_id, slot_id)).unwrap();
            assert_eq!(assigned, i as u16);

            let found = page.find_leaf_ref(key, false).unwrap().unwrap();
            assert_eq!(found, (heap_page_id, slot_id));
            assert!(page.has_key(key).unwrap());
        }

        assert!(page.is_dirty());
        assert!(!page.has_key(44444).unwrap());
        assert!(page.find_leaf_ref(44444, false).unwrap().is_none());
    }

    #[test]
    fn insert_until_page_reports_no_space() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        let mut successful = 0u32;
        let mut saw_full = false;
        for attempt in 0..PAGE_SIZE as i32 {
            match page.insert_cell(&leaf(100_000 + attempt, 0, 0)) {
                Some(_) => successful += 1,
                None => {
                    saw_full = true;
                    break;
                }
            }
        }

        assert!(saw_full);
        assert!(successful > 0);
        // a full page stays full
        assert!(page.insert_cell(&leaf(1, 0, 0)).is_none());
    }

    #[test]
    fn child_routing_picks_smallest_key_at_or_above_search_key() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, false, 999).unwrap();

        // deliberately inserted out of key order
        for &(key, child) in &[(10000, 63u16), (30000, 21), (20000, 42)] {
            page.insert_cell(&Cell::Intermediate(IntermediateCell::new(key, child)))
                .unwrap();
        }

        assert_eq!(page.find_child_page(10000).unwrap(), 63);
        assert_eq!(page.find_child_page(19999).unwrap(), 42);
        assert_eq!(page.find_child_page(20000).unwrap(), 42);
        assert_eq!(page.find_child_page(25000).unwrap(), 21);
        assert_eq!(page.find_child_page(30000).unwrap(), 21);
        assert_eq!(page.find_child_page(30001).unwrap(), 999);
    }

    #[test]
    fn invalidated_slot_is_skipped_and_key_reusable() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        let first = page.insert_cell(&leaf(123, 1, 1)).unwrap();
        page.invalidate_slot(first).unwrap();

        assert!(!page.has_key(123).unwrap());
        assert!(page.find_leaf_ref(123, false).unwrap().is_none());

        let second = page.insert_cell(&leaf(123, 2, 5)).unwrap();
        assert_ne!(first, second);
        assert!(page.has_key(123).unwrap());
        assert_eq!(page.find_leaf_ref(123, false).unwrap(), Some((2, 5)));
    }

    #[test]
    fn find_leaf_ref_can_invalidate_the_match() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        page.insert_cell(&leaf(42, 100, 7)).unwrap();

        let found = page.find_leaf_ref(42, true).unwrap();
        assert_eq!(found, Some((100, 7)));
        // the invalidation is immediately visible
        assert!(page.find_leaf_ref(42, false).unwrap().is_none());
    }

    #[test]
    fn record_value_bytes_round_trip() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        let payload = b"heap-value";
        let slot = page
            .insert_cell(&Cell::Record(RecordCell::new(10, payload)))
            .unwrap();

        assert_eq!(page.value_bytes(slot).unwrap(), payload);
    }

    #[test]
    fn value_bytes_fails_on_invalidated_slot() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        let slot = page
            .insert_cell(&Cell::Record(RecordCell::new(10, b"gone")))
            .unwrap();
        page.invalidate_slot(slot).unwrap();

        let result = page.value_bytes(slot);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalidated"));
    }

    #[test]
    fn value_bytes_fails_on_unknown_slot() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let page = Page::wrap(&mut data, &mut dirty).unwrap();

        let result = page.value_bytes(3);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn leaf_operations_reject_intermediate_nodes_and_vice_versa() {
        let mut leaf_data = [0u8; PAGE_SIZE];
        let mut leaf_dirty = false;
        let leaf_page = Page::init(&mut leaf_data, &mut leaf_dirty, true, 0).unwrap();

        let result = leaf_page.find_child_page(1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("leaf node"));

        let mut inner_data = [0u8; PAGE_SIZE];
        let mut inner_dirty = false;
        let mut inner_page = Page::init(&mut inner_data, &mut inner_dirty, false, 0).unwrap();

        assert!(inner_page.find_leaf_ref(1, false).is_err());
        assert!(inner_page.has_key(1).is_err());
    }

    #[test]
    fn mutations_set_dirty_and_clear_dirty_resets() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();

        assert!(!page.is_dirty());
        let slot = page.insert_cell(&leaf(1, 1, 1)).unwrap();
        assert!(page.is_dirty());

        page.clear_dirty();
        assert!(!page.is_dirty());

        page.invalidate_slot(slot).unwrap();
        assert!(page.is_dirty());
    }

    #[test]
    fn wrap_preserves_existing_contents() {
        let mut data = [0u8; PAGE_SIZE];
        let mut dirty = false;
        {
            let mut page = Page::init(&mut data, &mut dirty, true, 0).unwrap();
            page.insert_cell(&leaf(55, 9, 3)).unwrap();
        }

        let mut reload_dirty = false;
        let mut page = Page::wrap(&mut data, &mut reload_dirty).unwrap();
        assert!(!page.is_dirty());
        assert_eq!(page.find_leaf_ref(55, false).unwrap(), Some((9, 3)));
    }
}
