//! # B+Tree Module
//!
//! Index navigation for slotdb. The tree lives in an index file: page 0
//! is the root, intermediate nodes route keys downward, and leaf cells
//! reference records in a separate heap file by `(heap_page_id, slot_id)`.
//! There are no back-pointers; traversal is a DAG from the root down.
//!
//! [`BTreeCursor`] is the arbitration layer that coordinates the buffer
//! pool and the two files to execute a point operation as one synchronous
//! sequence.

mod cursor;

pub use cursor::BTreeCursor;
