//! # Buffer Pool
//!
//! The buffer pool owns one contiguous allocation of
//! `frame_count * PAGE_SIZE` bytes and services every page request in the
//! engine. A request either hits a resident frame or loads the page from
//! its file, evicting a victim first when no frame is free.
//!
//! ## Fetch Path
//!
//! ```text
//! get_page(page_id, file)
//!   ├── directory hit ──────────────> wrap resident frame
//!   └── miss
//!        ├── claim free frame (evict a victim when none is free;
//!        │   every occupied frame pinned is a hard error)
//!        ├── zero the frame
//!        ├── page id allocated in the file?
//!        │     yes: read page bytes into the frame, wrap
//!        │     no:  allocate the next page id, format the frame
//!        │          as a fresh leaf
//!        └── register the frame, return the view
//! ```
//!
//! Formatting unknown pages as leaves is a known simplification:
//! intermediate pages are created by writing a pre-formatted frame through
//! [`PagedFile::write_page`] instead.
//!
//! ## Eviction and Write-Back
//!
//! The victim is the directory's first occupied unpinned frame. A dirty
//! victim is written back through a `PagedFile` reopened on its recorded
//! path; the per-process shared stream makes that write coherent with
//! every other handle on the same file. The dirty flag is cleared before
//! the write.
//!
//! ## Aliasing Rules
//!
//! `get_page` borrows the pool mutably and the returned [`Page`] keeps
//! that borrow, so callers cannot hold a page view across a later
//! `get_page` that might recycle its frame. Cursor operations fetch one
//! page, finish with it, then fetch the next.

use eyre::{bail, eyre, Result};
use tracing::debug;

use super::frame::FrameDirectory;
use super::DEFAULT_FRAME_COUNT;
use crate::storage::{Page, PagedFile, PAGE_SIZE};

pub struct BufferPool {
    buffer: Box<[u8]>,
    directory: FrameDirectory,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_COUNT)
    }
}

impl BufferPool {
    pub fn new(frame_count: usize) -> Self {
        assert!(frame_count > 0, "buffer pool needs at least one frame");
        Self {
            buffer: vec![0u8; frame_count * PAGE_SIZE].into_boxed_slice(),
            directory: FrameDirectory::new(frame_count),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.directory.frame_count()
    }

    /// Returns a view over the requested page, reading it from `file` on
    /// a miss. A page id the file has never allocated is allocated now and
    /// the frame formatted as a fresh leaf.
    pub fn get_page(&mut self, page_id: u16, file: &mut PagedFile) -> Result<Page<'_>> {
        if let Some(frame_id) = self.directory.find_frame_by_page(page_id, file.path()) {
            let offset = frame_id * PAGE_SIZE;
            let frame = &mut self.buffer[offset..offset + PAGE_SIZE];
            let dirty = self.directory.dirty_flag_mut(frame_id)?;
            return Page::wrap(frame, dirty);
        }

        let frame_id = match self.directory.claim_free_frame() {
            Some(frame_id) => frame_id,
            None => {
                self.evict_page()?;
                self.directory
                    .claim_free_frame()
                    .ok_or_else(|| eyre!("no frame became free after eviction"))?
            }
        };

        let offset = frame_id * PAGE_SIZE;
        self.buffer[offset..offset + PAGE_SIZE].fill(0);

        let page_exists = file.is_page_id_used(page_id);
        if page_exists {
            file.load_page(page_id, &mut self.buffer[offset..offset + PAGE_SIZE])?;
        } else {
            let allocated = file.allocate_next_page_id()?;
            debug!(
                page_id,
                allocated,
                path = %file.path().display(),
                "initializing fresh leaf page"
            );
        }

        self.directory.register_page(frame_id, page_id, file.path());
        debug!(page_id, frame_id, path = %file.path().display(), "loaded page into frame");

        let frame = &mut self.buffer[offset..offset + PAGE_SIZE];
        let dirty = self.directory.dirty_flag_mut(frame_id)?;
        if page_exists {
            Page::wrap(frame, dirty)
        } else {
            Page::init(frame, dirty, true, 0)
        }
    }

    /// Evicts the first unpinned occupied frame, writing it back first
    /// when dirty. Fails when every occupied frame is pinned.
    pub fn evict_page(&mut self) -> Result<()> {
        let victim = match self.directory.find_victim_frame() {
            Some(victim) => victim,
            None => bail!("no evictable frame: all frames are pinned"),
        };

        let (page_id, file_path) = self
            .directory
            .frame_page(victim)
            .map(|(page_id, path)| (page_id, path.to_path_buf()))
            .ok_or_else(|| eyre!("victim frame {} is not occupied", victim))?;

        if self.directory.is_dirty(victim) {
            *self.directory.dirty_flag_mut(victim)? = false;
            let offset = victim * PAGE_SIZE;
            let mut file = PagedFile::open(&file_path)?;
            file.write_page(page_id, &self.buffer[offset..offset + PAGE_SIZE])?;
            debug!(
                page_id,
                frame_id = victim,
                path = %file_path.display(),
                "wrote back dirty page on eviction"
            );
        }

        self.directory.unregister_page(victim);
        debug!(page_id, frame_id = victim, "evicted page");
        Ok(())
    }
}
