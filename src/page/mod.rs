use crate::common::codec::{self, CodecError};
use crate::common::PageBuf;
use thiserror::Error;

pub mod slotted;

pub use slotted::SlottedPage;

/// Constants for the page header. Every page starts with a fixed 32-byte header; the
/// remaining bytes are laid out according to the page's variant.
pub(crate) const PAGE_LSN_OFFSET: usize = 0;
pub(crate) const ITEM_COUNT_OFFSET: usize = 8;
pub(crate) const DATA_START_OFFSET: usize = 12;
pub(crate) const PARENT_PAGE_INDEX_OFFSET: usize = 16;
pub(crate) const TYPE_PTR_1_OFFSET: usize = 20;
pub(crate) const TYPE_PTR_2_OFFSET: usize = 24;
pub(crate) const PAGE_TYPE_OFFSET: usize = 28;

/// Page variants stored in the header's type tag.
///
/// The meaning of the two type-specific header pointers depends on the variant:
/// a leaf node stores its previous/next sibling indexes, an internal node stores its
/// rightmost child index, and a table-header page stores the index of the tree's root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Invalid = 0,
    LeafNode = 1,
    InternalNode = 2,
    TableHeader = 3,
}

impl PageType {
    pub fn from_tag(tag: u8) -> Result<Self, PageError> {
        match tag {
            0 => Ok(PageType::Invalid),
            1 => Ok(PageType::LeafNode),
            2 => Ok(PageType::InternalNode),
            3 => Ok(PageType::TableHeader),
            _ => Err(PageError::UnknownPageType(tag)),
        }
    }
}

/// Read the page type tag out of a raw page buffer.
pub fn page_type_of(page: &PageBuf) -> Result<PageType, PageError> {
    PageType::from_tag(page[PAGE_TYPE_OFFSET])
}

/// Read the parent page index out of a raw page buffer.
pub fn parent_page_index_of(page: &PageBuf) -> Result<i32, PageError> {
    Ok(codec::read_i32(page, PARENT_PAGE_INDEX_OFFSET)?)
}

/// Custom error types to be used by page operations.
#[derive(Debug, Error)]
pub enum PageError {
    /// Error to be thrown when a page's type tag does not correspond to any known variant.
    #[error("unknown page type tag: {0}")]
    UnknownPageType(u8),

    /// Error to be thrown when a page is initialized with a variant that cannot be
    /// materialized on disk.
    #[error("a page cannot be initialized as {0:?}")]
    InvalidInitialization(PageType),

    /// Error to be thrown when a slot index is outside of the page's slot array.
    #[error("slot index {index} is out of bounds (item count: {count})")]
    SlotOutOfBounds { index: usize, count: usize },

    /// Error to be thrown when a slot points outside of the page's record heap.
    #[error("slot {index} points outside the record heap (offset: {offset}, length: {length})")]
    CorruptSlot {
        index: usize,
        offset: i32,
        length: i32,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
