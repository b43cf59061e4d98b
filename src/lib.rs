//! # slotdb - Embedded Key-Value Storage Core
//!
//! slotdb is the storage core of an educational embedded key-value engine.
//! A point key (a signed 32-bit integer) is translated into durable on-disk
//! bytes and back through three tightly coupled subsystems:
//!
//! - A **paged file** abstraction mapping fixed-size 4KB pages to byte
//!   ranges of a regular file, owning the high-water mark of allocated
//!   page ids.
//! - A **buffer pool** caching a fixed number of pages in memory, serving
//!   page requests against one or more files, and flushing dirty pages on
//!   eviction.
//! - A **B+tree cursor** navigating an index file from its root to a leaf
//!   and inserting, reading, and deleting record cells in a heap file.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        B+Tree Cursor (btree)        │  root-to-leaf traversal,
//! ├─────────────────────────────────────┤  record CRUD
//! │        Buffer Pool (buffer)         │  frame directory, eviction,
//! ├─────────────────────────────────────┤  dirty write-back
//! │   Slotted Pages & Cells (storage)   │  page layout, cell codecs
//! ├─────────────────────────────────────┤
//! │        Paged Files (storage)        │  header, page I/O,
//! └─────────────────────────────────────┘  shared streams
//! ```
//!
//! ## File Layout
//!
//! Each logical table is a pair of files with identical on-disk structure:
//!
//! ```text
//! data/
//! ├── users.index   # B+tree whose leaves reference records
//! └── users.db      # heap of record cells (the actual values)
//! ```
//!
//! Every file starts with a 256-byte header (bytes 0..2 hold the largest
//! page id ever allocated, little-endian); 4096-byte pages follow
//! contiguously. Page 0 is the root of an index file and the first heap
//! page of a heap file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotdb::{BTreeCursor, BufferPool, PagedFile};
//!
//! let mut pool = BufferPool::default();
//! let mut index = PagedFile::open("data/users.index")?;
//! let mut heap = PagedFile::open("data/users.db")?;
//!
//! BTreeCursor::insert(&mut pool, &mut index, &mut heap, 1, b"alice")?;
//! let value = BTreeCursor::read(&mut pool, &mut index, &mut heap, 1)?;
//! ```
//!
//! ## Scope
//!
//! The core is single-threaded and cooperative: every operation runs to
//! completion synchronously, and multi-threaded use requires external
//! serialization. Page splits, transactions, recovery logs, and any
//! networked or SQL front-end are out of scope.
//!
//! ## Module Overview
//!
//! - [`storage`]: cell codecs, the slotted-page view, paged file I/O
//! - [`buffer`]: frame directory and the buffer pool
//! - [`btree`]: the stateless B+tree cursor

pub mod btree;
pub mod buffer;
pub mod storage;

pub use btree::BTreeCursor;
pub use buffer::{BufferPool, FrameDirectory, DEFAULT_FRAME_COUNT};
pub use storage::{
    Cell, CellKind, IntermediateCell, LeafCell, Page, PagedFile, RecordCell, FILE_HEADER_SIZE,
    PAGE_SIZE,
};
