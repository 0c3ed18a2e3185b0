use minstore::buffer::{BufferError, BufferPoolManager};
use minstore::common::{PageId, PAGE_SIZE};
use minstore::disk::DiskManager;

use std::sync::Arc;
use std::thread;

mod common;

#[test]
fn test_create_page_is_pinned_and_zeroed() {
    let ctx = common::setup();
    let manager = &ctx.buffer_manager;

    let guard = manager.create_page(1).unwrap();
    assert_eq!(guard.page_id(), PageId::new(1, 0));
    assert_eq!(manager.pin_count(guard.page_id()), Some(1));
    assert!(guard.data().iter().all(|&byte| byte == 0));

    let page_id = guard.page_id();
    drop(guard);
    assert_eq!(manager.pin_count(page_id), Some(0));
}

#[test]
fn test_fetch_returns_written_bytes() {
    let ctx = common::setup();
    let manager = &ctx.buffer_manager;

    let page_id = {
        let guard = manager.create_page(1).unwrap();
        guard.data_mut()[100] = 42;
        guard.mark_dirty();
        guard.page_id()
    };

    let guard = manager.fetch_page(page_id).unwrap();
    assert_eq!(guard.data()[100], 42);
    assert_eq!(manager.pin_count(page_id), Some(1));
}

#[test]
fn test_fetch_missing_page_fails() {
    let ctx = common::setup();
    let result = ctx.buffer_manager.fetch_page(PageId::new(99, 0));
    assert!(matches!(result, Err(BufferError::CouldNotLoadPage { .. })));
}

#[test]
fn test_pool_full_when_all_pages_pinned() {
    let ctx = common::setup_with_pool_size(4);
    let manager = &ctx.buffer_manager;

    let mut guards = Vec::new();
    for _ in 0..4 {
        guards.push(manager.create_page(1).unwrap());
    }
    assert!(matches!(
        manager.create_page(1),
        Err(BufferError::BufferPoolFull)
    ));

    // Releasing one pin opens a frame for eviction.
    guards.pop();
    assert!(manager.create_page(1).is_ok());
}

#[test]
fn test_eviction_preserves_page_contents() {
    let ctx = common::setup_with_pool_size(4);
    let manager = &ctx.buffer_manager;

    // Write a distinct pattern into more pages than the pool holds.
    let mut page_ids = Vec::new();
    for i in 0..8u8 {
        let guard = manager.create_page(1).unwrap();
        guard.data_mut().fill(i);
        guard.mark_dirty();
        page_ids.push(guard.page_id());
    }

    // Fetching them all back forces evictions of dirty pages and reloads.
    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = manager.fetch_page(page_id).unwrap();
        assert!(guard.data().iter().all(|&byte| byte == i as u8));
    }
}

#[test]
fn test_flush_page_reports_whether_a_write_occurred() {
    let ctx = common::setup();
    let manager = &ctx.buffer_manager;

    let page_id = {
        let guard = manager.create_page(1).unwrap();
        guard.data_mut()[0] = 7;
        guard.mark_dirty();
        guard.page_id()
    };

    // The first flush writes; the second has nothing to do.
    assert!(manager.flush_page(page_id).unwrap());
    assert!(!manager.flush_page(page_id).unwrap());
    assert!(!manager.flush_page(PageId::new(1, 55)).unwrap());
}

#[test]
fn test_flush_all_dirty_pages_is_idempotent() {
    let ctx = common::setup();
    let manager = &ctx.buffer_manager;

    let mut page_ids = Vec::new();
    for i in 0..4u8 {
        let guard = manager.create_page(1).unwrap();
        guard.data_mut().fill(i + 1);
        guard.mark_dirty();
        page_ids.push(guard.page_id());
    }

    manager.flush_all_dirty_pages();

    // Every page is clean now, so further flushes perform no writes.
    for &page_id in &page_ids {
        assert!(!manager.flush_page(page_id).unwrap());
    }

    // The flushed bytes are byte-identical to what the buffer held.
    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = manager.fetch_page(page_id).unwrap();
        assert!(guard.data().iter().all(|&byte| byte == i as u8 + 1));
    }
}

#[test]
fn test_flushed_pages_survive_a_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let page_id;
    {
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        let manager = BufferPoolManager::new(4, disk_manager);
        let guard = manager.create_page(3).unwrap();
        guard.data_mut()[PAGE_SIZE - 1] = 0xAB;
        guard.mark_dirty();
        page_id = guard.page_id();
        drop(guard);
        manager.dispose();
    }

    let disk_manager = DiskManager::new(dir.path()).unwrap();
    let manager = BufferPoolManager::new(4, disk_manager);
    let guard = manager.fetch_page(page_id).unwrap();
    assert_eq!(guard.data()[PAGE_SIZE - 1], 0xAB);
}

#[test]
fn test_concurrent_fetches_observe_consistent_data() {
    let ctx = common::setup();
    let manager = Arc::clone(&ctx.buffer_manager);

    let page_id = {
        let guard = manager.create_page(1).unwrap();
        guard.data_mut().fill(213);
        guard.mark_dirty();
        guard.page_id()
    };

    // Make each thread independently fetch the same page and verify its contents.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let guard = manager.fetch_page(page_id).unwrap();
                assert!(guard.data().iter().all(|&byte| byte == 213));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(manager.pin_count(page_id), Some(0));
}

#[test]
fn test_concurrent_creates_get_distinct_pages() {
    let ctx = common::setup_with_pool_size(32);
    let manager = Arc::clone(&ctx.buffer_manager);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::new();
            for _ in 0..3 {
                let guard = manager.create_page(7).unwrap();
                ids.push(guard.page_id());
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().unwrap());
    }
    all_ids.sort_by_key(|id| id.page_index);
    all_ids.dedup();
    assert_eq!(all_ids.len(), 24);
}
