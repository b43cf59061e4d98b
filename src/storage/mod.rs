//! # Storage Module
//!
//! This module provides the on-disk representation for slotdb: fixed-size
//! slotted pages, the three cell codecs that live inside them, and the
//! paged file abstraction that moves pages between disk and memory.
//!
//! ## On-Disk Format
//!
//! Every file begins with a 256-byte file header whose first two bytes are
//! the little-endian `max_page_id` (the largest page id ever allocated).
//! Pages follow the header contiguously:
//!
//! ```text
//! Offset 0:      File header (256 bytes)
//! Offset 256:    Page 0 (4096 bytes)
//! Offset 4352:   Page 1 (4096 bytes)
//! ...
//! ```
//!
//! Within a page, a 256-byte node header is followed by a slot pointer
//! array growing upward and a cell heap growing downward from the end of
//! the page. See `page` for the full layout and `cell` for the cell wire
//! formats.
//!
//! ## Stream Sharing
//!
//! All [`PagedFile`] handles to the same path within a process share one
//! underlying I/O stream, so a write through one handle is visible to a
//! read through another without reopening. The shared stream is
//! reference-counted and flushed when the last handle releases it.
//!
//! ## Module Organization
//!
//! - `cell`: leaf, intermediate, and record cell codecs
//! - `page`: slotted-page view over a 4096-byte frame
//! - `file`: paged file I/O and the per-process stream registry

mod cell;
mod file;
mod page;

pub use cell::{
    is_valid, mark_invalid, Cell, CellKind, IntermediateCell, LeafCell, RecordCell,
    CELL_FLAG_SIZE, FLAG_INVALID, INTERMEDIATE_CELL_SIZE, LEAF_CELL_SIZE, RECORD_CELL_FIXED_SIZE,
};
pub use file::{
    heap_path, index_path, PagedFile, DATA_DIR, HEAP_FILE_EXTENSION, INDEX_FILE_EXTENSION,
};
pub use page::{Page, NODE_HEADER_SIZE};

/// Fixed page size: the unit of I/O and caching.
pub const PAGE_SIZE: usize = 4096;
/// Reserved node-header region at the front of every page; the slot
/// pointer array starts right after it.
pub const PAGE_HEADER_SIZE: usize = 256;
/// Per-file header preceding page 0.
pub const FILE_HEADER_SIZE: usize = 256;
/// One little-endian `u16` cell offset per slot.
pub const CELL_POINTER_SIZE: usize = 2;
