use crate::buffer::BufferError;
use crate::common::codec::CodecError;
use crate::common::{PageId, TableIdT};
use crate::page::{PageError, PageType};
use crate::relation::RelationError;

use thiserror::Error;

pub mod btree;
mod internal;
mod leaf;

pub use btree::{BTree, RangeScan};

/// Custom error types to be used by the B+Tree.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Error to be thrown when an insert collides with an existing primary key.
    #[error("a record with an equal primary key already exists")]
    DuplicateKey,

    /// Error to be thrown when an update targets a primary key that is not present.
    #[error("no record with the given primary key exists")]
    RecordNotFound,

    /// Error to be thrown when traversal encounters a page of an unexpected kind,
    /// indicating corruption or a programmer error.
    #[error("page {page_id} has unexpected type {actual:?}")]
    InvalidPageType { page_id: PageId, actual: PageType },

    /// Error to be thrown when a tree is created for a table that already has pages on
    /// disk.
    #[error("table {0} already exists on disk")]
    TableAlreadyExists(TableIdT),

    /// Error to be thrown when a record cannot fit in an empty leaf page.
    #[error("record of {size} bytes cannot fit in an empty leaf page")]
    RecordTooLarge { size: usize },

    /// Error to be thrown when a split is handed a sibling page that is not empty.
    #[error("split sibling page {0} is not empty")]
    SiblingNotEmpty(PageId),

    /// Error to be thrown when a node rewrite is handed more payload than fits a page.
    #[error("repopulating page {page_id} with {total} bytes exceeds its capacity")]
    RepopulateOverflow { page_id: PageId, total: usize },

    /// Error to be thrown when a split or promotion violates one of the tree's
    /// structural invariants.
    #[error("tree invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
