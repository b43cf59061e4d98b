//! # Buffer Module
//!
//! In-memory page caching for slotdb. The [`BufferPool`] owns one
//! contiguous buffer of `frame_count * PAGE_SIZE` bytes and hands out
//! page views over its frames; the [`FrameDirectory`] keeps the
//! bookkeeping (free frames, the `(page, file)` to frame index, pin
//! counts, dirty flags) and picks eviction victims.
//!
//! Page views returned from [`BufferPool::get_page`] borrow the pool
//! mutably, so a view can never outlive the next `get_page` call that
//! might evict its frame; the borrow checker enforces what a pin/unpin
//! discipline would enforce at runtime.

mod frame;
mod pool;

pub use frame::FrameDirectory;
pub use pool::BufferPool;

/// Frames in a pool unless the caller asks for a different capacity.
pub const DEFAULT_FRAME_COUNT: usize = 10;
