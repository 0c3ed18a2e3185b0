use minstore::buffer::BufferPoolManager;
use minstore::disk::DiskManager;

use std::sync::Arc;

use tempfile::TempDir;

/// Constants used for testing. The pool is kept small so tests exercise eviction.
pub const TEST_POOL_SIZE: usize = 16;
pub const TEST_TABLE_ID: i32 = 100;

pub struct TestContext {
    pub buffer_manager: Arc<BufferPoolManager>,
    pub dir: TempDir,
}

pub fn setup() -> TestContext {
    setup_with_pool_size(TEST_POOL_SIZE)
}

pub fn setup_with_pool_size(pool_size: usize) -> TestContext {
    let dir = TempDir::new().unwrap();
    let disk_manager = DiskManager::new(dir.path()).unwrap();
    TestContext {
        buffer_manager: Arc::new(BufferPoolManager::new(pool_size, disk_manager)),
        dir,
    }
}
