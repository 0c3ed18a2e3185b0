use crate::common::{PageBuf, PageId};
use crate::disk::DiskError;

use std::cell::Cell;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

pub mod manager;
pub mod replacement;

pub use manager::BufferPoolManager;

/// Type alias for a shared page buffer owned by a buffer frame. The bytes are only
/// mutated by a task that holds a pin on the page.
pub type FrameArc = Arc<RwLock<Box<PageBuf>>>;

/// Metadata about the page occupying a buffer frame. All fields are guarded by the
/// buffer manager's replacer lock; the page bytes themselves live in the frame's
/// separately-locked buffer.
#[derive(Debug)]
pub(crate) struct FrameMeta {
    /// ID of the page currently held in the frame, if any.
    pub page_id: Option<PageId>,

    /// Number of active references to the contained page. A frame with a non-zero pin
    /// count is never chosen as an eviction victim.
    pub pin_count: u32,

    /// True if the contained page has been modified since being read from disk.
    pub is_dirty: bool,
}

impl FrameMeta {
    pub fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
        }
    }

    /// Clear the metadata back to its unoccupied state.
    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.is_dirty = false;
    }
}

/// A scoped pin on a buffer page.
///
/// The guard is handed out by the buffer manager with the pin count already incremented,
/// and unpins the page when dropped. Callers that modify the page bytes must call
/// `mark_dirty` so the eventual unpin records the modification; this makes pin release
/// automatic on every exit path, including error unwinding mid-operation.
pub struct PageGuard<'a> {
    manager: &'a BufferPoolManager,
    frame: FrameArc,
    page_id: PageId,
    dirty: Cell<bool>,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(manager: &'a BufferPoolManager, frame: FrameArc, page_id: PageId) -> Self {
        Self {
            manager,
            frame,
            page_id,
            dirty: Cell::new(false),
        }
    }

    /// Return the ID of the pinned page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Record that the holder has modified the page bytes. The flag is handed to the
    /// buffer manager when the guard is dropped.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    /// Acquire shared access to the page bytes.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<PageBuf>> {
        self.frame.read().unwrap()
    }

    /// Acquire exclusive access to the page bytes.
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<PageBuf>> {
        self.frame.write().unwrap()
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.manager.unpin_page(self.page_id, self.dirty.get());
    }
}

/// Custom error types to be used by the buffer manager.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Error to be thrown when no buffer frames are open, and every page occupying a
    /// buffer frame is pinned and cannot be evicted.
    #[error("no available buffer frames, and all pages are pinned")]
    BufferPoolFull,

    /// Error to be thrown when a page could not be read into an acquired frame. The
    /// frame is reverted to the free list before this error surfaces.
    #[error("could not load page {page_id} into the buffer pool")]
    CouldNotLoadPage {
        page_id: PageId,
        #[source]
        source: DiskError,
    },

    /// Error to be thrown when a dirty page could not be written out to disk.
    #[error("could not flush page {page_id} to disk")]
    CouldNotFlushToDisk {
        page_id: PageId,
        #[source]
        source: DiskError,
    },

    #[error(transparent)]
    Disk(#[from] DiskError),
}
