//! # B+Tree Cursor
//!
//! Stateless point operations over an index file and a heap file, routed
//! through a buffer pool. Every operation fetches one page at a time and
//! finishes with it before fetching the next, so page views never outlive
//! an eviction.
//!
//! ## Traversal
//!
//! Descent starts at page 0 (always the root) and follows
//! `find_child_page` until a leaf answers. Intermediate nodes are never
//! invalidated during a descent, even when the operation will invalidate
//! the leaf cell; a concurrency-safe invalidation rule for inner nodes is
//! deferred until a concurrency layer exists.
//!
//! ## Failure Semantics
//!
//! Failures are terminal for the current operation; nothing is retried.
//! `insert` appends the record cell to the heap before touching the leaf,
//! so a leaf-full failure after a successful heap append leaves an
//! orphaned record cell behind. Rollback or a two-phase insert would fix
//! that; until then the limitation is documented here.

use eyre::{ensure, eyre, Result};
use tracing::debug;

use crate::buffer::BufferPool;
use crate::storage::{Cell, LeafCell, PagedFile, RecordCell};

/// Coordinates the buffer pool, an index file, and a heap file for point
/// reads and writes. All operations are associated functions; the cursor
/// holds no state of its own.
pub struct BTreeCursor;

impl BTreeCursor {
    /// Descends from the root to the leaf responsible for `key` and
    /// returns its page id.
    pub fn find_leaf_page_id(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        key: i32,
    ) -> Result<u16> {
        let mut page_id: u16 = 0;
        loop {
            let page = pool.get_page(page_id, index_file)?;
            if page.is_leaf() {
                return Ok(page_id);
            }
            let child = page.find_child_page(key)?;
            ensure!(
                index_file.is_page_id_used(child),
                "corrupt index: page {} routes key {} to unallocated page {}",
                page_id,
                key,
                child
            );
            ensure!(
                child != page_id,
                "corrupt index: page {} routes key {} to itself",
                page_id,
                key
            );
            page_id = child;
        }
    }

    /// Locates `key` in the index and returns the `(heap_page_id,
    /// slot_id)` its leaf cell references. With `do_invalidate` the leaf
    /// cell is invalidated on the way out; intermediate nodes are left
    /// alone either way.
    pub fn find_record_location(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        key: i32,
        do_invalidate: bool,
    ) -> Result<Option<(u16, u16)>> {
        let leaf_page_id = Self::find_leaf_page_id(pool, index_file, key)?;
        let mut leaf = pool.get_page(leaf_page_id, index_file)?;
        leaf.find_leaf_ref(key, do_invalidate)
    }

    /// Returns the value stored under `key`.
    pub fn read(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        heap_file: &mut PagedFile,
        key: i32,
    ) -> Result<Vec<u8>> {
        let (heap_page_id, slot_id) = Self::find_record_location(pool, index_file, key, false)?
            .ok_or_else(|| eyre!("key {} not found", key))?;

        let page = pool.get_page(heap_page_id, heap_file)?;
        Ok(page.value_bytes(slot_id)?.to_vec())
    }

    /// Removes `key`: invalidates its leaf cell, then the record cell the
    /// leaf referenced.
    pub fn remove(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        heap_file: &mut PagedFile,
        key: i32,
    ) -> Result<()> {
        let (heap_page_id, slot_id) = Self::find_record_location(pool, index_file, key, true)?
            .ok_or_else(|| eyre!("key {} not found", key))?;

        let mut page = pool.get_page(heap_page_id, heap_file)?;
        page.invalidate_slot(slot_id)?;
        debug!(key, heap_page_id, slot_id, "removed record");
        Ok(())
    }

    /// Inserts `(key, value)`: the record cell goes to the heap file's
    /// current maximum page (rolling over to a fresh page when full), then
    /// a leaf cell referencing it goes into the index.
    pub fn insert(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        heap_file: &mut PagedFile,
        key: i32,
        value: &[u8],
    ) -> Result<()> {
        ensure!(
            Self::find_record_location(pool, index_file, key, false)?.is_none(),
            "key {} already exists: duplicate keys are not allowed",
            key
        );

        let record = Cell::Record(RecordCell::new(key, value));

        let mut heap_page_id = heap_file.max_page_id();
        let mut slot_id = {
            let mut page = pool.get_page(heap_page_id, heap_file)?;
            page.insert_cell(&record)
        };
        if slot_id.is_none() {
            // roll over to a fresh heap page; the pool allocates and
            // formats it on first fetch
            heap_page_id = heap_file
                .max_page_id()
                .checked_add(1)
                .ok_or_else(|| eyre!("page id overflow in '{}'", heap_file.path().display()))?;
            let mut page = pool.get_page(heap_page_id, heap_file)?;
            slot_id = page.insert_cell(&record);
        }
        let slot_id = slot_id.ok_or_else(|| {
            eyre!(
                "record cell of {} bytes does not fit in an empty heap page",
                record.payload_size()
            )
        })?;
        debug!(key, heap_page_id, slot_id, "inserted record cell");

        let leaf_page_id = Self::find_leaf_page_id(pool, index_file, key)?;
        let mut leaf = pool.get_page(leaf_page_id, index_file)?;
        leaf.insert_cell(&Cell::Leaf(LeafCell::new(key, heap_page_id, slot_id)))
            .ok_or_else(|| {
                eyre!(
                    "leaf page {} is full: page split not implemented",
                    leaf_page_id
                )
            })?;
        debug!(key, leaf_page_id, "inserted leaf cell");
        Ok(())
    }

    /// Replaces the value under `key`. Modeled as a remove followed by an
    /// insert: coarse, but it keeps the page invariants simple and needs
    /// no in-place rewrite or split handling.
    pub fn update(
        pool: &mut BufferPool,
        index_file: &mut PagedFile,
        heap_file: &mut PagedFile,
        key: i32,
        value: &[u8],
    ) -> Result<()> {
        Self::remove(pool, index_file, heap_file, key)?;
        Self::insert(pool, index_file, heap_file, key, value)
    }
}
