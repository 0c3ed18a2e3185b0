use crate::buffer::replacement::LRUReplacer;
use crate::buffer::{BufferError, FrameArc, FrameMeta, PageGuard};
use crate::common::{BufferFrameIdT, PageId, TableIdT, PAGE_SIZE};
use crate::disk::DiskManager;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, error};

/// The buffer manager is responsible for managing database pages that are cached in
/// memory. Higher layers of the database system make requests to the buffer manager to
/// create and fetch pages. Any pages that don't exist in the buffer are retrieved from
/// disk via the disk manager. Multiple threads may make requests to the buffer manager in
/// parallel, so its implementation must be thread-safe.
///
/// Synchronization is split three ways: the page table is a shared map used by the
/// fetch fast path, a single replacer lock guards every frame's metadata together with
/// the free list and the LRU queue, and each frame's page bytes sit behind their own
/// read-write lock so that disk I/O always happens outside the replacer lock. A map of
/// per-page load locks deduplicates concurrent misses for the same page.
pub struct BufferPoolManager {
    /// Page buffers for each frame in the pool.
    frames: Vec<FrameArc>,

    /// Frame metadata, the free list, and the LRU queue, guarded as one unit.
    core: Mutex<PoolCore>,

    /// Mapping of pages to the buffer frames that they occupy.
    page_table: RwLock<HashMap<PageId, BufferFrameIdT>>,

    /// Per-page locks that serialize loads of the same missing page.
    load_locks: Mutex<HashMap<PageId, Arc<Mutex<()>>>>,

    /// Disk manager for reading from and writing to disk.
    disk_manager: DiskManager,
}

struct PoolCore {
    meta: Vec<FrameMeta>,
    free_frames: VecDeque<BufferFrameIdT>,
    replacer: LRUReplacer,
}

impl BufferPoolManager {
    /// Construct a new buffer manager with the given number of frames.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        let frames: Vec<FrameArc> = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))))
            .collect();
        let core = PoolCore {
            meta: (0..pool_size).map(|_| FrameMeta::new()).collect(),
            free_frames: (0..pool_size).collect(),
            replacer: LRUReplacer::new(),
        };
        Self {
            frames,
            core: Mutex::new(core),
            page_table: RwLock::new(HashMap::with_capacity(pool_size)),
            load_locks: Mutex::new(HashMap::new()),
            disk_manager,
        }
    }

    /// Return the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Return the current pin count of the specified page, or None if it is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = { self.page_table.read().unwrap().get(&page_id).copied() }?;
        let core = self.core.lock().unwrap();
        let meta = &core.meta[frame_id];
        match meta.page_id == Some(page_id) {
            true => Some(meta.pin_count),
            false => None,
        }
    }

    /// Allocate a page on disk for the specified table, pin it in a frame, and return its
    /// guard. The new page starts zeroed and is flagged dirty so it reaches disk even if
    /// the holder never writes to it.
    pub fn create_page(&self, table_id: TableIdT) -> Result<PageGuard<'_>, BufferError> {
        let page_id = self.disk_manager.allocate_new_page(table_id)?;
        let frame_id = self.acquire_frame(page_id, true)?;
        {
            let mut data = self.frames[frame_id].write().unwrap();
            data.fill(0);
        }
        self.page_table.write().unwrap().insert(page_id, frame_id);
        Ok(PageGuard::new(self, self.frames[frame_id].clone(), page_id))
    }

    /// Fetch the specified page, pin it, and return its guard. If the page does not exist
    /// in the buffer, then fetch the page from disk. If the page does not exist on disk,
    /// then return an error.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageGuard<'_>, BufferError> {
        // Fast path: the page is already resident.
        if let Some(guard) = self.try_fetch_resident(page_id) {
            return Ok(guard);
        }

        // Slow path: take the page's load lock so only one thread reads it from disk,
        // then re-check residency since another thread may have loaded it meanwhile.
        let load_lock = self.page_load_lock(page_id);
        let result = {
            let _loading = load_lock.lock().unwrap();
            match self.try_fetch_resident(page_id) {
                Some(guard) => Ok(guard),
                None => self.load_page(page_id),
            }
        };
        self.collect_load_lock(page_id, load_lock);
        result
    }

    /// Pin the specified page if it currently occupies a frame.
    fn try_fetch_resident(&self, page_id: PageId) -> Option<PageGuard<'_>> {
        let frame_id = { self.page_table.read().unwrap().get(&page_id).copied() }?;

        let mut core = self.core.lock().unwrap();
        // The frame may have been handed to another page between the page-table lookup
        // and this point; re-validate under the replacer lock.
        if core.meta[frame_id].page_id != Some(page_id) {
            return None;
        }
        core.meta[frame_id].pin_count += 1;
        core.replacer.touch(frame_id);
        Some(PageGuard::new(self, self.frames[frame_id].clone(), page_id))
    }

    /// Read the specified page from disk into a newly acquired frame.
    fn load_page(&self, page_id: PageId) -> Result<PageGuard<'_>, BufferError> {
        let frame_id = self.acquire_frame(page_id, false)?;
        {
            let mut data = self.frames[frame_id].write().unwrap();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut data) {
                data.fill(0);
                drop(data);
                self.revert_failed_load(frame_id);
                return Err(BufferError::CouldNotLoadPage { page_id, source: e });
            }
        }
        self.page_table.write().unwrap().insert(page_id, frame_id);
        Ok(PageGuard::new(self, self.frames[frame_id].clone(), page_id))
    }

    /// Acquire a frame for the given page: a free frame if one exists, otherwise the
    /// least recently used unpinned frame. The frame leaves this method pinned once and
    /// assigned to `page_id`; if a dirty page was displaced, it is flushed to disk after
    /// the replacer lock has been released.
    fn acquire_frame(
        &self,
        page_id: PageId,
        is_dirty: bool,
    ) -> Result<BufferFrameIdT, BufferError> {
        let (frame_id, displaced) = {
            let mut core = self.core.lock().unwrap();
            let frame_id = match core.free_frames.pop_front() {
                Some(frame_id) => frame_id,
                None => {
                    let meta = &core.meta;
                    match core.replacer.victim(|id| meta[id].pin_count == 0) {
                        Some(frame_id) => frame_id,
                        None => return Err(BufferError::BufferPoolFull),
                    }
                }
            };

            let meta = &mut core.meta[frame_id];
            let displaced = meta.page_id.take().map(|old_id| (old_id, meta.is_dirty));
            meta.page_id = Some(page_id);
            meta.pin_count = 1;
            meta.is_dirty = is_dirty;

            // Remove the displaced page's mapping as part of the same critical section
            // as the frame hand-off.
            if let Some((old_id, _)) = displaced {
                self.page_table.write().unwrap().remove(&old_id);
                debug!(victim = %old_id, %page_id, frame_id, "evicting page");
            }
            core.replacer.touch(frame_id);
            (frame_id, displaced)
        };

        if let Some((old_id, true)) = displaced {
            let data = self.frames[frame_id].read().unwrap();
            if let Err(e) = self.disk_manager.write_page(old_id, &data) {
                drop(data);
                self.restore_displaced(frame_id, old_id);
                return Err(BufferError::CouldNotFlushToDisk {
                    page_id: old_id,
                    source: e,
                });
            }
        }
        Ok(frame_id)
    }

    /// Put the displaced page back into its frame after its eviction flush failed.
    fn restore_displaced(&self, frame_id: BufferFrameIdT, old_id: PageId) {
        let mut core = self.core.lock().unwrap();
        let meta = &mut core.meta[frame_id];
        meta.page_id = Some(old_id);
        meta.pin_count = 0;
        meta.is_dirty = true;
        self.page_table.write().unwrap().insert(old_id, frame_id);
    }

    /// Return a frame to the free list after its page failed to load.
    fn revert_failed_load(&self, frame_id: BufferFrameIdT) {
        let mut core = self.core.lock().unwrap();
        core.meta[frame_id].reset();
        core.replacer.remove(frame_id);
        core.free_frames.push_back(frame_id);
    }

    /// Unpin the specified page. Pages with no pins can be evicted. Threads must unpin a
    /// page when finished operating on it; this is normally done by dropping the page's
    /// guard. Panics if the page is not resident or not pinned, since that indicates a
    /// missing or double unpin.
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) {
        let frame_id = { self.page_table.read().unwrap().get(&page_id).copied() };
        let frame_id = match frame_id {
            Some(frame_id) => frame_id,
            None => panic!("Cannot unpin page {} which is not resident", page_id),
        };

        let mut core = self.core.lock().unwrap();
        let meta = &mut core.meta[frame_id];
        if meta.page_id != Some(page_id) {
            panic!("Cannot unpin page {} which is not resident", page_id);
        }
        if meta.pin_count == 0 {
            panic!("Cannot unpin page {} with pin count equal to 0", page_id);
        }
        meta.pin_count -= 1;
        meta.is_dirty |= is_dirty;
    }

    /// Flush the specified page to disk if it is resident and dirty. Returns whether a
    /// write occurred.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferError> {
        let frame_id = { self.page_table.read().unwrap().get(&page_id).copied() };
        let frame_id = match frame_id {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };

        {
            let mut core = self.core.lock().unwrap();
            let meta = &mut core.meta[frame_id];
            if meta.page_id != Some(page_id) || !meta.is_dirty {
                return Ok(false);
            }
            // Clear the flag before writing so modifications made during the write are
            // not lost, and hold a pin so the frame cannot be reassigned meanwhile.
            meta.is_dirty = false;
            meta.pin_count += 1;
        }

        let result = {
            let data = self.frames[frame_id].read().unwrap();
            self.disk_manager.write_page(page_id, &data)
        };

        let mut core = self.core.lock().unwrap();
        let meta = &mut core.meta[frame_id];
        meta.pin_count -= 1;
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                meta.is_dirty = true;
                Err(BufferError::CouldNotFlushToDisk {
                    page_id,
                    source: e,
                })
            }
        }
    }

    /// Flush every dirty page to disk. Failures are logged and do not interrupt the
    /// remaining flushes.
    pub fn flush_all_dirty_pages(&self) {
        let pages: Vec<PageId> = self.page_table.read().unwrap().keys().copied().collect();
        for page_id in pages {
            if let Err(e) = self.flush_page(page_id) {
                error!(%page_id, error = %e, "failed to flush dirty page");
            }
        }
    }

    /// Flush all dirty pages out to disk before the pool is released.
    pub fn dispose(&self) {
        self.flush_all_dirty_pages();
    }

    /// Return the load lock for the given page, creating one if necessary.
    fn page_load_lock(&self, page_id: PageId) -> Arc<Mutex<()>> {
        self.load_locks
            .lock()
            .unwrap()
            .entry(page_id)
            .or_default()
            .clone()
    }

    /// Drop a load-lock handle and garbage-collect the map entry once unused.
    fn collect_load_lock(&self, page_id: PageId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.load_locks.lock().unwrap();
        if let Some(entry) = locks.get(&page_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&page_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    struct TestContext {
        _dir: TempDir,
        manager: Arc<BufferPoolManager>,
    }

    fn setup(pool_size: usize) -> TestContext {
        let dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        TestContext {
            manager: Arc::new(BufferPoolManager::new(pool_size, disk_manager)),
            _dir: dir,
        }
    }

    #[test]
    fn test_failed_load_returns_frame_to_free_list() {
        let ctx = setup(1);

        // A missing table leaves the single frame unusable unless the failed load
        // reverts it.
        let result = ctx.manager.fetch_page(PageId::new(9, 0));
        assert!(matches!(result, Err(BufferError::CouldNotLoadPage { .. })));

        let guard = ctx.manager.create_page(1).unwrap();
        assert_eq!(guard.page_id(), PageId::new(1, 0));
    }

    #[test]
    fn test_victim_selection_follows_lru_order() {
        let ctx = setup(2);
        let manager = &ctx.manager;

        let first = manager.create_page(1).unwrap().page_id();
        let second = manager.create_page(1).unwrap().page_id();

        // Touch the older page so the other becomes the eviction candidate.
        let held = manager.fetch_page(first).unwrap();
        let third = manager.create_page(1).unwrap().page_id();

        assert_eq!(manager.pin_count(second), None);
        assert_eq!(manager.pin_count(first), Some(1));
        assert_eq!(manager.pin_count(third), Some(1));
        drop(held);
    }

    #[test]
    fn test_concurrent_misses_deduplicate_through_the_load_lock() {
        let dir = TempDir::new().unwrap();
        let page_id;
        {
            let disk_manager = DiskManager::new(dir.path()).unwrap();
            let manager = BufferPoolManager::new(4, disk_manager);
            let guard = manager.create_page(1).unwrap();
            guard.data_mut().fill(99);
            guard.mark_dirty();
            page_id = guard.page_id();
            drop(guard);
            manager.dispose();
        }

        // A fresh pool has the page cold; every thread misses at once.
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        let manager = Arc::new(BufferPoolManager::new(4, disk_manager));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(thread::spawn(move || {
                let guard = manager.fetch_page(page_id).unwrap();
                assert!(guard.data().iter().all(|&byte| byte == 99));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.pin_count(page_id), Some(0));
    }

    #[test]
    fn test_dirty_flag_accumulates_across_pins() {
        let ctx = setup(2);
        let manager = &ctx.manager;

        let page_id = manager.create_page(1).unwrap().page_id();
        manager.flush_page(page_id).unwrap();

        // A clean pin-unpin cycle must not mark the page dirty.
        drop(manager.fetch_page(page_id).unwrap());
        assert!(!manager.flush_page(page_id).unwrap());

        // A pin that wrote marks it dirty at unpin time.
        {
            let guard = manager.fetch_page(page_id).unwrap();
            guard.data_mut()[0] = 1;
            guard.mark_dirty();
        }
        assert!(manager.flush_page(page_id).unwrap());
    }
}
