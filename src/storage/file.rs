//! # Paged File I/O
//!
//! This module implements [`PagedFile`], the durable byte container for
//! one logical table or index. A file is a 256-byte header followed by
//! 4096-byte pages:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------------
//! 0       2     max_page_id (u16 LE): high-water mark of
//!               allocated page ids
//! 2       254   reserved, zero-filled
//! 256     4096  page 0
//! 4352    4096  page 1
//! ...
//! ```
//!
//! `max_page_id` is monotonically non-decreasing. A page slot exists on
//! disk exactly when its id is at or below the high-water mark; it may be
//! logically empty until something is written there, so reads past the
//! physical end of the file yield zeroes. Allocation is dense and
//! monotonic within a process; the on-disk counter is not rewritten on
//! allocation (callers that need durability write the header themselves).
//!
//! ## Stream Sharing
//!
//! The same file can back multiple buffer pool frames through independent
//! handles, so the underlying I/O stream is cached per process: a registry
//! maps each path to a weak reference on its open stream. Every handle on
//! a path shares the stream, which makes a write through one handle
//! visible to a read through another without reopening. When the last
//! handle drops, the stream is flushed and closed; flush errors at that
//! point are logged and swallowed so they cannot mask the error that
//! caused the drop.
//!
//! ## Path Convention
//!
//! Tables conventionally live under `./data/<table>.index` and
//! `./data/<table>.db`; [`index_path`] and [`heap_path`] build those
//! paths, but the core itself only ever takes explicit paths.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{FILE_HEADER_SIZE, PAGE_SIZE};

/// Extension of B+tree index files.
pub const INDEX_FILE_EXTENSION: &str = "index";
/// Extension of heap files holding record cells.
pub const HEAP_FILE_EXTENSION: &str = "db";
/// Conventional directory for table files.
pub const DATA_DIR: &str = "data";

/// `./data/<table>.index`
pub fn index_path(table: &str) -> PathBuf {
    Path::new(DATA_DIR).join(format!("{table}.{INDEX_FILE_EXTENSION}"))
}

/// `./data/<table>.db`
pub fn heap_path(table: &str) -> PathBuf {
    Path::new(DATA_DIR).join(format!("{table}.{HEAP_FILE_EXTENSION}"))
}

/// One open stream shared by every handle on a path.
#[derive(Debug)]
struct SharedStream {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl Drop for SharedStream {
    fn drop(&mut self) {
        // last handle released: flush, but never mask the caller's error
        if let Err(err) = self.file.get_mut().sync_all() {
            warn!(
                path = %self.path.display(),
                %err,
                "failed to flush shared stream on close"
            );
        }
    }
}

fn stream_registry() -> &'static Mutex<HashMap<PathBuf, Weak<SharedStream>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<SharedStream>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn open_shared_stream(path: &Path) -> Result<Arc<SharedStream>> {
    let mut registry = stream_registry().lock();

    if let Some(existing) = registry.get(path).and_then(Weak::upgrade) {
        return Ok(existing);
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .wrap_err_with(|| format!("failed to open file '{}'", path.display()))?;

    let stream = Arc::new(SharedStream {
        path: path.to_path_buf(),
        file: Mutex::new(file),
    });
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.insert(path.to_path_buf(), Arc::downgrade(&stream));

    Ok(stream)
}

/// Handle on one table or index file.
///
/// Handles are cheap: the heavy state is the process-shared stream. Each
/// handle carries its own in-memory copy of `max_page_id`, loaded from the
/// header at open time.
#[derive(Debug)]
pub struct PagedFile {
    path: PathBuf,
    stream: Arc<SharedStream>,
    max_page_id: u16,
}

impl PagedFile {
    /// Opens `path`, creating it with a zero-filled header when missing
    /// or empty. For an existing file the header yields `max_page_id`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = open_shared_stream(&path)?;

        let mut max_page_id = 0u16;
        {
            let mut file = stream.file.lock();
            let len = file
                .seek(SeekFrom::End(0))
                .wrap_err_with(|| format!("failed to seek in '{}'", path.display()))?;

            if len == 0 {
                file.seek(SeekFrom::Start(0))
                    .wrap_err_with(|| format!("failed to seek in '{}'", path.display()))?;
                file.write_all(&[0u8; FILE_HEADER_SIZE]).wrap_err_with(|| {
                    format!("failed to write file header to '{}'", path.display())
                })?;
                debug!(path = %path.display(), "created paged file");
            } else {
                ensure!(
                    len as usize >= FILE_HEADER_SIZE,
                    "corrupted header: '{}' is {} bytes, shorter than the {}-byte header",
                    path.display(),
                    len,
                    FILE_HEADER_SIZE
                );
                let mut header = [0u8; 2];
                file.seek(SeekFrom::Start(0))
                    .wrap_err_with(|| format!("failed to seek in '{}'", path.display()))?;
                file.read_exact(&mut header).wrap_err_with(|| {
                    format!("failed to read file header from '{}'", path.display())
                })?;
                max_page_id = u16::from_le_bytes(header);
                debug!(path = %path.display(), max_page_id, "opened paged file");
            }
        }

        Ok(Self {
            path,
            stream,
            max_page_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest page id ever allocated in this file.
    pub fn max_page_id(&self) -> u16 {
        self.max_page_id
    }

    /// True when the page slot exists on disk (it may still be logically
    /// empty until initialized).
    pub fn is_page_id_used(&self, page_id: u16) -> bool {
        page_id <= self.max_page_id
    }

    /// Bumps and returns the high-water mark. Allocation is dense and
    /// monotonic; the on-disk header is not rewritten here.
    pub fn allocate_next_page_id(&mut self) -> Result<u16> {
        ensure!(
            self.max_page_id < u16::MAX,
            "page id overflow in '{}'",
            self.path.display()
        );
        self.max_page_id += 1;
        Ok(self.max_page_id)
    }

    fn page_offset(page_id: u16) -> u64 {
        FILE_HEADER_SIZE as u64 + page_id as u64 * PAGE_SIZE as u64
    }

    /// Writes one full page at its slot.
    pub fn write_page(&mut self, page_id: u16, buffer: &[u8]) -> Result<()> {
        ensure!(
            buffer.len() == PAGE_SIZE,
            "page buffer must be {} bytes, got {}",
            PAGE_SIZE,
            buffer.len()
        );

        let mut file = self.stream.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))
            .wrap_err_with(|| {
                format!(
                    "failed to seek to page {} in '{}'",
                    page_id,
                    self.path.display()
                )
            })?;
        file.write_all(buffer).wrap_err_with(|| {
            format!(
                "failed to write page {} to '{}'",
                page_id,
                self.path.display()
            )
        })?;
        Ok(())
    }

    /// Reads one full page into `buffer`. Bytes past the physical end of
    /// the file read as zeroes: an allocated slot may never have been
    /// written.
    pub fn load_page(&mut self, page_id: u16, buffer: &mut [u8]) -> Result<()> {
        ensure!(
            buffer.len() == PAGE_SIZE,
            "page buffer must be {} bytes, got {}",
            PAGE_SIZE,
            buffer.len()
        );

        let mut file = self.stream.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))
            .wrap_err_with(|| {
                format!(
                    "failed to seek to page {} in '{}'",
                    page_id,
                    self.path.display()
                )
            })?;

        let mut filled = 0;
        while filled < buffer.len() {
            let read = file.read(&mut buffer[filled..]).wrap_err_with(|| {
                format!(
                    "failed to read page {} from '{}'",
                    page_id,
                    self.path.display()
                )
            })?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buffer[filled..].fill(0);
        Ok(())
    }
}
