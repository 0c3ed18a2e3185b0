use crate::common::{PageBuf, PageId, PageIndexT, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};
use crate::index::IndexError;
use crate::page::{PageType, SlottedPage};
use crate::relation::record::{self, Key, Record};
use crate::relation::Schema;

use std::cmp::Ordering;

/// A B+Tree leaf node: a slotted page whose records are full serialized rows kept in
/// ascending primary-key order. Leaves form a doubly linked chain through the
/// previous/next sibling indexes in the page header, which the range scan follows.
pub(crate) struct LeafNode<'a> {
    page: SlottedPage<'a>,
    page_id: PageId,
    schema: &'a Schema,
}

impl<'a> LeafNode<'a> {
    /// Wrap an existing leaf page.
    pub fn attach(
        page_id: PageId,
        data: &'a mut PageBuf,
        schema: &'a Schema,
    ) -> Result<Self, IndexError> {
        let page = SlottedPage::new(data);
        let page_type = page.page_type()?;
        if page_type != PageType::LeafNode {
            return Err(IndexError::InvalidPageType {
                page_id,
                actual: page_type,
            });
        }
        Ok(Self {
            page,
            page_id,
            schema,
        })
    }

    /// Format the page as an empty leaf and wrap it.
    pub fn initialize(
        page_id: PageId,
        data: &'a mut PageBuf,
        schema: &'a Schema,
        parent_page_index: PageIndexT,
    ) -> Result<Self, IndexError> {
        let mut page = SlottedPage::new(data);
        page.initialize(PageType::LeafNode, parent_page_index)?;
        Ok(Self {
            page,
            page_id,
            schema,
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

    pub fn prev_page_index(&self) -> PageIndexT {
        self.page.prev_page_index()
    }

    pub fn set_prev_page_index(&mut self, index: PageIndexT) -> Result<(), IndexError> {
        Ok(self.page.set_prev_page_index(index)?)
    }

    pub fn next_page_index(&self) -> PageIndexT {
        self.page.next_page_index()
    }

    pub fn set_next_page_index(&mut self, index: PageIndexT) -> Result<(), IndexError> {
        Ok(self.page.set_next_page_index(index)?)
    }

    /// Return the raw bytes of the record in the given slot.
    pub fn raw_record_at(&self, index: usize) -> Result<&[u8], IndexError> {
        Ok(self.page.get_record(index)?)
    }

    /// Decode the record in the given slot.
    pub fn record_at(&self, index: usize) -> Result<Record, IndexError> {
        Ok(record::deserialize(self.page.get_record(index)?, self.schema)?)
    }

    /// Decode the primary key of the record in the given slot.
    pub fn key_at(&self, index: usize) -> Result<Key, IndexError> {
        Ok(record::decode_key(self.page.get_record(index)?, self.schema)?)
    }

    /// Binary search for the given key over the slot array. Returns the slot index on a
    /// hit; otherwise returns the bitwise complement of the index at which the key would
    /// be inserted.
    pub fn find_slot_index(&self, key: &Key) -> Result<i32, IndexError> {
        let mut lo: i32 = 0;
        let mut hi: i32 = self.item_count() as i32 - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = self.key_at(mid as usize)?;
            match key.compare(&mid_key).map_err(IndexError::from)? {
                Ordering::Equal => return Ok(mid),
                Ordering::Less => hi = mid - 1,
                Ordering::Greater => lo = mid + 1,
            }
        }
        Ok(!lo)
    }

    /// Return the record with the given key, or None.
    pub fn search(&self, key: &Key) -> Result<Option<Record>, IndexError> {
        let index = self.find_slot_index(key)?;
        match index >= 0 {
            true => Ok(Some(self.record_at(index as usize)?)),
            false => Ok(None),
        }
    }

    /// Try to insert the record in key order. Returns false if the page has no room for
    /// it; rejects records whose key is already present.
    pub fn try_insert(&mut self, new_record: &Record) -> Result<bool, IndexError> {
        let key = record::primary_key(new_record, self.schema)?;
        let bytes = record::serialize(new_record, self.schema)?;
        let index = self.find_slot_index(&key)?;
        if index >= 0 {
            return Err(IndexError::DuplicateKey);
        }
        Ok(self.page.try_add_record(&bytes, !index as usize)?)
    }

    /// Try to overwrite the record whose key matches the given record's key. Returns
    /// false if the page has no room for the rewritten payload.
    pub fn try_update(&mut self, new_record: &Record) -> Result<bool, IndexError> {
        let key = record::primary_key(new_record, self.schema)?;
        let bytes = record::serialize(new_record, self.schema)?;
        let index = self.find_slot_index(&key)?;
        if index < 0 {
            return Err(IndexError::RecordNotFound);
        }
        Ok(self.page.try_update_record(index as usize, &bytes)?)
    }

    /// Overwrite the record whose key matches the given record's key, rewriting the
    /// whole node when the heap has no room for the new payload. Rewriting reclaims
    /// tombstoned and superseded heap space, so this only fails if the updated record
    /// set genuinely exceeds the page's capacity.
    pub fn update_compacting(&mut self, new_record: &Record) -> Result<(), IndexError> {
        let key = record::primary_key(new_record, self.schema)?;
        let bytes = record::serialize(new_record, self.schema)?;
        let index = self.find_slot_index(&key)?;
        if index < 0 {
            return Err(IndexError::RecordNotFound);
        }
        if self.page.try_update_record(index as usize, &bytes)? {
            return Ok(());
        }

        let mut records = Vec::with_capacity(self.item_count());
        for slot in 0..self.item_count() {
            if slot == index as usize {
                records.push(bytes.clone());
                continue;
            }
            let raw = self.raw_record_at(slot)?;
            if !raw.is_empty() {
                records.push(raw.to_vec());
            }
        }

        let prev = self.prev_page_index();
        let next = self.next_page_index();
        self.repopulate(&records)?;
        self.set_prev_page_index(prev)?;
        self.set_next_page_index(next)?;
        Ok(())
    }

    /// Tombstone the record with the given key. Returns whether a record was deleted.
    pub fn delete(&mut self, key: &Key) -> Result<bool, IndexError> {
        let index = self.find_slot_index(key)?;
        match index >= 0 {
            true => {
                self.page.delete_record(index as usize)?;
                Ok(true)
            }
            false => Ok(false),
        }
    }

    /// Return slot-ordered copies of the raw record bytes, skipping tombstones.
    pub fn get_all_raw_records(&self) -> Result<Vec<Vec<u8>>, IndexError> {
        let mut records = Vec::with_capacity(self.item_count());
        for index in 0..self.item_count() {
            let raw = self.raw_record_at(index)?;
            if !raw.is_empty() {
                records.push(raw.to_vec());
            }
        }
        Ok(records)
    }

    /// Rewrite the page with the given sorted records, reclaiming tombstoned heap
    /// space. The parent pointer is preserved; sibling pointers are reset and must be
    /// spliced by the caller. Fails without mutating the page if the records cannot fit.
    pub fn repopulate(&mut self, records: &[Vec<u8>]) -> Result<(), IndexError> {
        let total: usize = records.iter().map(|r| r.len() + SLOT_SIZE).sum();
        if total > PAGE_SIZE - PAGE_HEADER_SIZE {
            return Err(IndexError::RepopulateOverflow {
                page_id: self.page_id,
                total,
            });
        }
        let parent = self.parent_page_index();
        self.page.initialize(PageType::LeafNode, parent)?;
        for (index, bytes) in records.iter().enumerate() {
            if !self.page.try_add_record(bytes, index)? {
                return Err(IndexError::InvariantViolation(format!(
                    "record {} did not fit while repopulating page {}",
                    index, self.page_id
                )));
            }
        }
        Ok(())
    }

    /// Split this full leaf to make room for the new record.
    ///
    /// All existing records plus the new one are redistributed between this page and the
    /// empty right sibling: the left half stays here and the right half moves. When any
    /// column is variable-length the midpoint is byte-balanced (the first record whose
    /// cumulative size crosses half the payload); otherwise it is the item-count
    /// midpoint. The sibling chain is spliced around the new leaf, including the old
    /// right neighbor's back pointer when one exists. Returns the first key of the right
    /// half, which the caller promotes as the separator.
    pub fn split_and_insert(
        &mut self,
        new_record: &Record,
        new_right: &mut LeafNode<'_>,
        old_right_sibling: Option<&mut LeafNode<'_>>,
    ) -> Result<Key, IndexError> {
        if new_right.item_count() != 0 {
            return Err(IndexError::SiblingNotEmpty(new_right.page_id));
        }

        let key = record::primary_key(new_record, self.schema)?;
        let bytes = record::serialize(new_record, self.schema)?;
        let mut records = self.get_all_raw_records()?;
        let index = self.find_slot_index(&key)?;
        if index >= 0 {
            return Err(IndexError::DuplicateKey);
        }
        records.insert(!index as usize, bytes);

        let mid = match self.schema.has_variable_columns() {
            true => byte_balanced_midpoint(&records),
            false => records.len() / 2,
        }
        .clamp(1, records.len() - 1);
        let separator = record::decode_key(&records[mid], self.schema)?;

        let parent = self.parent_page_index();
        let prev = self.prev_page_index();
        let old_next = self.next_page_index();

        // Rewrite the left half in place, then fill the right sibling.
        self.repopulate(&records[..mid])?;
        for (i, record_bytes) in records[mid..].iter().enumerate() {
            if !new_right.page.try_add_record(record_bytes, i)? {
                return Err(IndexError::InvariantViolation(format!(
                    "record {} did not fit in new right leaf {}",
                    mid + i,
                    new_right.page_id
                )));
            }
        }
        new_right.set_parent_page_index(parent)?;

        // Splice the sibling chain around the new leaf.
        self.set_prev_page_index(prev)?;
        self.set_next_page_index(new_right.page_id.page_index)?;
        new_right.set_prev_page_index(self.page_id.page_index)?;
        new_right.set_next_page_index(old_next)?;
        if let Some(sibling) = old_right_sibling {
            sibling.set_prev_page_index(new_right.page_id.page_index)?;
        }

        Ok(separator)
    }
}

/// Walk the sorted records accumulating their slotted size and return the index of the
/// first record whose cumulative size exceeds half the total.
fn byte_balanced_midpoint(records: &[Vec<u8>]) -> usize {
    let total: usize = records.iter().map(|r| r.len() + SLOT_SIZE).sum();
    let mut cumulative = 0;
    for (index, record_bytes) in records.iter().enumerate() {
        cumulative += record_bytes.len() + SLOT_SIZE;
        if cumulative > total / 2 {
            return index;
        }
    }
    records.len() / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{INVALID_PAGE_INDEX, PAGE_SIZE};
    use crate::relation::column::Column;
    use crate::relation::types::{DataType, Value};

    fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new("id", DataType::Int, false),
                Column::new("data", DataType::Varchar, false).with_max_length(4000),
            ],
            &["id"],
        )
        .unwrap()
    }

    fn row(id: i32, data: &str) -> Record {
        Record::new(vec![Value::Int(id), Value::Varchar(data.to_string())])
    }

    fn key(id: i32) -> Key {
        Key::new(vec![Value::Int(id)])
    }

    #[test]
    fn test_insert_keeps_key_order() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();

        for id in [30, 10, 20] {
            assert!(leaf.try_insert(&row(id, "x")).unwrap());
        }
        assert_eq!(leaf.key_at(0).unwrap(), key(10));
        assert_eq!(leaf.key_at(1).unwrap(), key(20));
        assert_eq!(leaf.key_at(2).unwrap(), key(30));
    }

    #[test]
    fn test_search() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(100, "Hello World")).unwrap();

        assert_eq!(leaf.search(&key(100)).unwrap(), Some(row(100, "Hello World")));
        assert_eq!(leaf.search(&key(1)).unwrap(), None);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(1, "a")).unwrap();

        let result = leaf.try_insert(&row(1, "b"));
        assert!(matches!(result, Err(IndexError::DuplicateKey)));
        assert_eq!(leaf.search(&key(1)).unwrap(), Some(row(1, "a")));
    }

    #[test]
    fn test_insert_returns_false_when_full() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();

        let payload = "A".repeat(2500);
        assert!(leaf.try_insert(&row(1, &payload)).unwrap());
        assert!(leaf.try_insert(&row(2, &payload)).unwrap());
        assert!(leaf.try_insert(&row(3, &payload)).unwrap());
        assert!(!leaf.try_insert(&row(4, &payload)).unwrap());
        assert_eq!(leaf.item_count(), 3);
    }

    #[test]
    fn test_update_record() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(5, "before")).unwrap();

        assert!(leaf.try_update(&row(5, "after")).unwrap());
        assert_eq!(leaf.search(&key(5)).unwrap(), Some(row(5, "after")));

        let result = leaf.try_update(&row(6, "missing"));
        assert!(matches!(result, Err(IndexError::RecordNotFound)));
    }

    #[test]
    fn test_update_compacting_rewrites_when_heap_is_exhausted() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();

        // Fill most of the heap, then shrink one record so the page carries dead
        // space that only a rewrite can reclaim.
        leaf.try_insert(&row(1, &"a".repeat(2500))).unwrap();
        leaf.try_insert(&row(2, &"b".repeat(2500))).unwrap();
        leaf.try_insert(&row(3, &"c".repeat(2500))).unwrap();
        leaf.update_compacting(&row(2, "tiny")).unwrap();

        // Growing a record back now needs the reclaimed space.
        leaf.update_compacting(&row(2, &"B".repeat(2400))).unwrap();
        assert_eq!(leaf.search(&key(2)).unwrap(), Some(row(2, &"B".repeat(2400))));
        assert_eq!(leaf.item_count(), 3);
        assert_eq!(leaf.key_at(0).unwrap(), key(1));
        assert_eq!(leaf.key_at(2).unwrap(), key(3));
    }

    #[test]
    fn test_update_compacting_preserves_sibling_pointers() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 2), &mut buf, &schema, 5).unwrap();
        leaf.set_prev_page_index(1).unwrap();
        leaf.set_next_page_index(3).unwrap();

        leaf.try_insert(&row(1, &"a".repeat(3900))).unwrap();
        leaf.try_insert(&row(2, &"b".repeat(3900))).unwrap();
        // Too little free space for in-place growth forces the rewrite path.
        leaf.update_compacting(&row(1, &"A".repeat(3999))).unwrap();

        assert_eq!(leaf.parent_page_index(), 5);
        assert_eq!(leaf.prev_page_index(), 1);
        assert_eq!(leaf.next_page_index(), 3);
    }

    #[test]
    fn test_update_compacting_missing_key() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(1, "a")).unwrap();

        let result = leaf.update_compacting(&row(2, "b"));
        assert!(matches!(result, Err(IndexError::RecordNotFound)));
    }

    #[test]
    fn test_delete_tombstones_record() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(1, "a")).unwrap();

        assert!(leaf.delete(&key(1)).unwrap());
        assert_eq!(leaf.item_count(), 1);
        assert!(leaf.raw_record_at(0).unwrap().is_empty());
        assert!(leaf.get_all_raw_records().unwrap().is_empty());
        assert!(!leaf.delete(&key(2)).unwrap());
    }

    #[test]
    fn test_repopulate_reclaims_tombstones() {
        let schema = schema();
        let mut buf = [0u8; PAGE_SIZE];
        let mut leaf =
            LeafNode::initialize(PageId::new(1, 1), &mut buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        leaf.try_insert(&row(1, "a")).unwrap();
        leaf.try_insert(&row(2, "b")).unwrap();
        leaf.delete(&key(1)).unwrap();

        let survivors = leaf.get_all_raw_records().unwrap();
        leaf.repopulate(&survivors).unwrap();
        assert_eq!(leaf.item_count(), 1);
        assert_eq!(leaf.key_at(0).unwrap(), key(2));
    }

    #[test]
    fn test_split_redistributes_and_chains() {
        let schema = schema();
        let payload = "A".repeat(2500);

        let mut left_buf = [0u8; PAGE_SIZE];
        let mut left =
            LeafNode::initialize(PageId::new(1, 1), &mut left_buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        for id in [10, 20, 30] {
            left.try_insert(&row(id, &payload)).unwrap();
        }

        let mut right_buf = [0u8; PAGE_SIZE];
        let mut right =
            LeafNode::initialize(PageId::new(1, 2), &mut right_buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();

        let separator = left
            .split_and_insert(&row(40, &payload), &mut right, None)
            .unwrap();

        assert_eq!(separator, key(30));
        assert_eq!(left.item_count(), 2);
        assert_eq!(right.item_count(), 2);
        assert_eq!(right.key_at(0).unwrap(), key(30));
        assert_eq!(right.key_at(1).unwrap(), key(40));

        // The chain is spliced left -> right.
        assert_eq!(left.next_page_index(), 2);
        assert_eq!(right.prev_page_index(), 1);
        assert_eq!(right.next_page_index(), INVALID_PAGE_INDEX);
    }

    #[test]
    fn test_split_rejects_nonempty_sibling() {
        let schema = schema();
        let mut left_buf = [0u8; PAGE_SIZE];
        let mut left =
            LeafNode::initialize(PageId::new(1, 1), &mut left_buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        left.try_insert(&row(1, "a")).unwrap();

        let mut right_buf = [0u8; PAGE_SIZE];
        let mut right =
            LeafNode::initialize(PageId::new(1, 2), &mut right_buf, &schema, INVALID_PAGE_INDEX)
                .unwrap();
        right.try_insert(&row(9, "z")).unwrap();

        let result = left.split_and_insert(&row(2, "b"), &mut right, None);
        assert!(matches!(result, Err(IndexError::SiblingNotEmpty(_))));
    }

    #[test]
    fn test_byte_balanced_midpoint_prefers_size_over_count() {
        // Ten small records followed by large ones: the midpoint lands past the
        // item-count middle because the small records contribute little payload.
        let mut records: Vec<Vec<u8>> = (0..10).map(|_| vec![0u8; 8]).collect();
        records.extend((0..4).map(|_| vec![0u8; 2000]));

        let mid = byte_balanced_midpoint(&records);
        assert_eq!(mid, 11);
    }
}
