use std::fmt;

pub mod bitmap;
pub mod codec;

/// Note: The type aliases and global constants below are primarily to improve readability
/// throughout the codebase. The values should not be configured/modified unless explicitly
/// annotated with "safe to modify".

/// Type aliases
pub type TableIdT = i32;
pub type PageIndexT = i32;
pub type BufferFrameIdT = usize;
pub type LsnT = u64;

/// Global constants
pub const PAGE_SIZE: usize = 8192; // safe to modify
pub const PAGE_HEADER_SIZE: usize = 32;
pub const SLOT_SIZE: usize = 8;
pub const INVALID_PAGE_INDEX: PageIndexT = -1;
pub const TABLE_HEADER_PAGE_INDEX: PageIndexT = 0;
pub const TABLE_FILE_EXTENSION: &str = "tbl"; // safe to modify

/// A raw page buffer. Every page, regardless of its variant, is exactly PAGE_SIZE bytes.
pub type PageBuf = [u8; PAGE_SIZE];

/// A page identifier comprised of the owning table's ID and the page's index within that
/// table's file. Page index 0 is reserved for the table-header page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableIdT,
    pub page_index: PageIndexT,
}

impl PageId {
    pub fn new(table_id: TableIdT, page_index: PageIndexT) -> Self {
        Self {
            table_id,
            page_index,
        }
    }

    /// Return the ID of the given table's header page.
    pub fn table_header(table_id: TableIdT) -> Self {
        Self::new(table_id, TABLE_HEADER_PAGE_INDEX)
    }

    /// Return whether this ID refers to a table-header page.
    pub fn is_table_header(&self) -> bool {
        self.page_index == TABLE_HEADER_PAGE_INDEX
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(table: {}, page: {})", self.table_id, self.page_index)
    }
}
