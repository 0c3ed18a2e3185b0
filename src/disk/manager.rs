use crate::common::{PageBuf, PageId, PageIndexT, TableIdT, PAGE_SIZE, TABLE_FILE_EXTENSION};

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// The disk manager is responsible for managing pages stored on disk. Each table is kept
/// in its own file named `<table_id>.tbl`, a sequence of PAGE_SIZE-byte pages. Page 0 is
/// the table-header page; subsequent pages are allocated by appending to the file.
///
/// The manager is stateless beyond its base directory, so its API is atomic and
/// thread-safe without any explicit locking.
pub struct DiskManager {
    base_dir: PathBuf,
}

impl DiskManager {
    /// Create a new disk manager rooted at the given directory. The directory is created
    /// up-front if it does not already exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, DiskError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Return the path of the specified table's file.
    fn table_file_path(&self, table_id: TableIdT) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", table_id, TABLE_FILE_EXTENSION))
    }

    /// Return whether a file exists on disk for the specified table.
    pub fn table_file_exists(&self, table_id: TableIdT) -> bool {
        self.table_file_path(table_id).is_file()
    }

    /// Guarantee that a file exists on disk for the specified table. Creates an empty
    /// file if none exists; an existing file is left untouched.
    pub fn create_table_file(&self, table_id: TableIdT) -> Result<(), DiskError> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .open(self.table_file_path(table_id))?;
        Ok(())
    }

    /// Read a single page's data into the specified byte array.
    pub fn read_page(&self, page_id: PageId, page_data: &mut PageBuf) -> Result<(), DiskError> {
        let offset = Self::page_offset(page_id)?;
        let mut file = match File::open(self.table_file_path(page_id.table_id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DiskError::TableFileNotFound(page_id.table_id));
            }
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page_data).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DiskError::ShortRead(page_id)
            } else {
                e.into()
            }
        })
    }

    /// Write the specified byte array out to disk.
    pub fn write_page(&self, page_id: PageId, page_data: &PageBuf) -> Result<(), DiskError> {
        let offset = Self::page_offset(page_id)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .open(self.table_file_path(page_id.table_id))
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DiskError::TableFileNotFound(page_id.table_id));
            }
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page_data)?;
        file.flush()?;
        Ok(())
    }

    /// Allocate a page at the end of the specified table's file and return its ID. The
    /// file is created if it does not exist yet, and extended by one full page.
    pub fn allocate_new_page(&self, table_id: TableIdT) -> Result<PageId, DiskError> {
        self.create_table_file(table_id)?;

        let file = OpenOptions::new()
            .write(true)
            .open(self.table_file_path(table_id))?;
        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            warn!(
                table_id,
                file_len = len,
                "table file length is not page-aligned; allocating at the next aligned page"
            );
        }

        let page_index = (len / PAGE_SIZE as u64) as PageIndexT;
        file.set_len((page_index as u64 + 1) * PAGE_SIZE as u64)?;
        Ok(PageId::new(table_id, page_index))
    }

    /// Map a page ID to its byte offset within the table file.
    fn page_offset(page_id: PageId) -> Result<u64, DiskError> {
        if page_id.page_index < 0 {
            return Err(DiskError::InvalidPageIndex(page_id.page_index));
        }
        Ok(page_id.page_index as u64 * PAGE_SIZE as u64)
    }
}

/// Custom error types to be used by the disk manager.
#[derive(Debug, Error)]
pub enum DiskError {
    /// Error to be thrown when an operation targets a table whose file does not exist.
    #[error("file for table {0} does not exist")]
    TableFileNotFound(TableIdT),

    /// Error to be thrown when fewer than PAGE_SIZE bytes could be read for a page.
    #[error("short read on page {0}")]
    ShortRead(PageId),

    /// Error to be thrown when a page ID carries a negative page index.
    #[error("page index {0} is negative")]
    InvalidPageIndex(PageIndexT),

    #[error(transparent)]
    Io(#[from] io::Error),
}
