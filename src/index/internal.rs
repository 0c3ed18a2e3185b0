use crate::common::codec;
use crate::common::{PageBuf, PageId, PageIndexT, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};
use crate::index::IndexError;
use crate::page::{PageType, SlottedPage};
use crate::relation::record::{self, Key};
use crate::relation::Schema;

use std::cmp::Ordering;

/// A B+Tree internal node: a slotted page whose records are separator entries, each a
/// serialized key followed by the two i32 halves of a child page ID, plus a
/// distinguished rightmost child in the page header.
///
/// A separator's child subtree holds keys strictly below the separator. An exact match
/// during child lookup therefore descends into the next child to the right; this is the
/// same convention the insert path and the scan seeding apply.
pub(crate) struct InternalNode<'a> {
    page: SlottedPage<'a>,
    page_id: PageId,
    key_schema: &'a Schema,
}

/// Number of trailing bytes an entry devotes to its child pointer.
const CHILD_PTR_SIZE: usize = 8;

impl<'a> InternalNode<'a> {
    /// Wrap an existing internal page.
    pub fn attach(
        page_id: PageId,
        data: &'a mut PageBuf,
        key_schema: &'a Schema,
    ) -> Result<Self, IndexError> {
        let page = SlottedPage::new(data);
        let page_type = page.page_type()?;
        if page_type != PageType::InternalNode {
            return Err(IndexError::InvalidPageType {
                page_id,
                actual: page_type,
            });
        }
        Ok(Self {
            page,
            page_id,
            key_schema,
        })
    }

    /// Format the page as an empty internal node and wrap it.
    pub fn initialize(
        page_id: PageId,
        data: &'a mut PageBuf,
        key_schema: &'a Schema,
        parent_page_index: PageIndexT,
    ) -> Result<Self, IndexError> {
        let mut page = SlottedPage::new(data);
        page.initialize(PageType::InternalNode, parent_page_index)?;
        Ok(Self {
            page,
            page_id,
            key_schema,
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn item_count(&self) -> usize {
        self.page.item_count()
    }

    pub fn parent_page_index(&self) -> PageIndexT {
        self.page.parent_page_index()
    }

    pub fn set_parent_page_index(&mut self, index: PageIndexT) -> Result<(), IndexError> {
        Ok(self.page.set_parent_page_index(index)?)
    }

    pub fn rightmost_child_index(&self) -> PageIndexT {
        self.page.rightmost_child_index()
    }

    pub fn set_rightmost_child_index(&mut self, index: PageIndexT) -> Result<(), IndexError> {
        Ok(self.page.set_rightmost_child_index(index)?)
    }

    fn rightmost_child(&self) -> PageId {
        PageId::new(self.page_id.table_id, self.rightmost_child_index())
    }

    /// Serialize a separator entry: the key bytes followed by the child page ID.
    fn encode_entry(&self, key: &Key, child: PageId) -> Result<Vec<u8>, IndexError> {
        let mut bytes = record::serialize_key(key, self.key_schema)?;
        bytes.extend_from_slice(&child.table_id.to_le_bytes());
        bytes.extend_from_slice(&child.page_index.to_le_bytes());
        Ok(bytes)
    }

    fn child_of_entry(entry: &[u8]) -> Result<PageId, IndexError> {
        if entry.len() < CHILD_PTR_SIZE {
            return Err(IndexError::InvariantViolation(
                "separator entry too short to hold a child pointer".to_string(),
            ));
        }
        let base = entry.len() - CHILD_PTR_SIZE;
        let table_id = codec::read_i32(entry, base)?;
        let page_index = codec::read_i32(entry, base + 4)?;
        Ok(PageId::new(table_id, page_index))
    }

    /// Decode the separator key in the given slot.
    pub fn key_at(&self, index: usize) -> Result<Key, IndexError> {
        Ok(record::deserialize_key(
            self.page.get_record(index)?,
            self.key_schema,
        )?)
    }

    /// Return the child page referenced by the entry in the given slot.
    pub fn child_at(&self, index: usize) -> Result<PageId, IndexError> {
        Self::child_of_entry(self.page.get_record(index)?)
    }

    /// Rewrite the child pointer of the entry in the given slot. The rewritten entry has
    /// the same length, so the update always lands in place.
    pub fn set_child_at(&mut self, index: usize, child: PageId) -> Result<(), IndexError> {
        let mut entry = self.page.get_record(index)?.to_vec();
        if entry.len() < CHILD_PTR_SIZE {
            return Err(IndexError::InvariantViolation(
                "separator entry too short to hold a child pointer".to_string(),
            ));
        }
        let base = entry.len() - CHILD_PTR_SIZE;
        codec::write_i32(&mut entry, base, child.table_id)?;
        codec::write_i32(&mut entry, base + 4, child.page_index)?;
        if !self.page.try_update_record(index, &entry)? {
            return Err(IndexError::InvariantViolation(format!(
                "same-length child rewrite did not fit in page {}",
                self.page_id
            )));
        }
        Ok(())
    }

    /// Binary search for the given key over the separator entries. Returns the slot
    /// index on a hit; otherwise the bitwise complement of the insertion index.
    pub fn find_slot_index(&self, key: &Key) -> Result<i32, IndexError> {
        let mut lo: i32 = 0;
        let mut hi: i32 = self.item_count() as i32 - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = self.key_at(mid as usize)?;
            match key.compare(&mid_key)? {
                Ordering::Equal => return Ok(mid),
                Ordering::Less => hi = mid - 1,
                Ordering::Greater => lo = mid + 1,
            }
        }
        Ok(!lo)
    }

    /// Return the child page whose subtree would contain the given key.
    pub fn lookup_child_page(&self, key: &Key) -> Result<PageId, IndexError> {
        let count = self.item_count();
        let index = self.find_slot_index(key)?;
        if index >= 0 {
            // Exact hit: the separator's own child holds strictly smaller keys, so the
            // key lives one child to the right.
            let next = index as usize + 1;
            match next < count {
                true => self.child_at(next),
                false => Ok(self.rightmost_child()),
            }
        } else {
            let at = !index as usize;
            match at < count {
                true => self.child_at(at),
                false => Ok(self.rightmost_child()),
            }
        }
    }

    /// Return the leftmost child, used to seed unbounded range scans.
    pub fn first_child(&self) -> Result<PageId, IndexError> {
        match self.item_count() > 0 {
            true => self.child_at(0),
            false => Ok(self.rightmost_child()),
        }
    }

    /// Return every child referenced by this node, slot children first and the rightmost
    /// child last.
    pub fn children(&self) -> Result<Vec<PageId>, IndexError> {
        let mut children = Vec::with_capacity(self.item_count() + 1);
        for index in 0..self.item_count() {
            children.push(self.child_at(index)?);
        }
        children.push(self.rightmost_child());
        Ok(children)
    }

    /// Try to insert a separator entry in key order. Returns false if the page has no
    /// room for it; duplicate separators are rejected.
    pub fn try_insert(&mut self, key: &Key, child: PageId) -> Result<bool, IndexError> {
        let index = self.find_slot_index(key)?;
        if index >= 0 {
            return Err(IndexError::DuplicateKey);
        }
        let entry = self.encode_entry(key, child)?;
        Ok(self.page.try_add_record(&entry, !index as usize)?)
    }

    /// Return slot-ordered copies of the raw entry bytes.
    pub fn get_all_raw_records(&self) -> Result<Vec<Vec<u8>>, IndexError> {
        let mut entries = Vec::with_capacity(self.item_count());
        for index in 0..self.item_count() {
            entries.push(self.page.get_record(index)?.to_vec());
        }
        Ok(entries)
    }

    /// Rewrite the page with the given sorted entries. The parent pointer is preserved;
    /// the rightmost child is reset and must be restored by the caller. Fails without
    /// mutating the page if the entries cannot fit.
    pub fn repopulate(&mut self, entries: &[Vec<u8>]) -> Result<(), IndexError> {
        let total: usize = entries.iter().map(|e| e.len() + SLOT_SIZE).sum();
        if total > PAGE_SIZE - PAGE_HEADER_SIZE {
            return Err(IndexError::RepopulateOverflow {
                page_id: self.page_id,
                total,
            });
        }
        let parent = self.parent_page_index();
        self.page.initialize(PageType::InternalNode, parent)?;
        for (index, entry) in entries.iter().enumerate() {
            if !self.page.try_add_record(entry, index)? {
                return Err(IndexError::InvariantViolation(format!(
                    "entry {} did not fit while repopulating page {}",
                    index, self.page_id
                )));
            }
        }
        Ok(())
    }

    /// Split this full internal node to make room for the new separator entry.
    ///
    /// The sorted entry list, including the new entry, is divided at its median: the
    /// left half stays here with the median's child as its new rightmost, the entries
    /// past the median move to the empty right sibling which inherits the old rightmost,
    /// and the median's key is returned for promotion into the parent.
    pub fn split_and_insert(
        &mut self,
        new_key: &Key,
        new_child: PageId,
        new_right: &mut InternalNode<'_>,
    ) -> Result<Key, IndexError> {
        if new_right.item_count() != 0 {
            return Err(IndexError::SiblingNotEmpty(new_right.page_id));
        }

        let mut entries = self.get_all_raw_records()?;
        let index = self.find_slot_index(new_key)?;
        if index >= 0 {
            return Err(IndexError::DuplicateKey);
        }
        entries.insert(!index as usize, self.encode_entry(new_key, new_child)?);

        let median = entries.len() / 2;
        let promoted_key = record::deserialize_key(&entries[median], self.key_schema)?;
        let promoted_child = Self::child_of_entry(&entries[median])?;

        let parent = self.parent_page_index();
        let old_rightmost = self.rightmost_child_index();

        self.repopulate(&entries[..median])?;
        self.set_rightmost_child_index(promoted_child.page_index)?;

        for (i, entry) in entries[median + 1..].iter().enumerate() {
            if !new_right.page.try_add_record(entry, i)? {
                return Err(IndexError::InvariantViolation(format!(
                    "entry {} did not fit in new right internal node {}",
                    median + 1 + i,
                    new_right.page_id
                )));
            }
        }
        new_right.set_parent_page_index(parent)?;
        new_right.set_rightmost_child_index(old_rightmost)?;

        Ok(promoted_key)
    }
}
