use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{
    PageId, PageIndexT, TableIdT, INVALID_PAGE_INDEX, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE,
};
use crate::index::internal::InternalNode;
use crate::index::leaf::LeafNode;
use crate::index::IndexError;
use crate::page::{page_type_of, PageType, SlottedPage};
use crate::relation::record::{self, Key, Record};
use crate::relation::{RelationError, Schema, Value};

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// A clustered B+Tree holding a relation's records in primary-key order.
///
/// All pages are reached through the buffer pool by index; the tree itself only holds
/// the table ID and the current root index, which is also persisted in the table-header
/// page (page 0 of the table's file) so the tree can be reopened. Records live in the
/// leaf level, which forms a doubly linked chain for range scans; internal nodes hold
/// separator keys whose children contain strictly smaller keys.
pub struct BTree {
    buffer: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    key_schema: Schema,
    table_id: TableIdT,
    root_page_index: RwLock<PageIndexT>,
}

/// The outcome of a node split handed upward by the insert path: the promoted separator
/// and the page indexes of the two siblings it divides.
struct SplitResult {
    separator: Key,
    left: PageIndexT,
    right: PageIndexT,
}

impl BTree {
    /// Create a new tree for the given table: a table-header page at index 0 and an
    /// empty leaf root at index 1. Fails if the table already has pages on disk.
    pub fn create(
        buffer: Arc<BufferPoolManager>,
        schema: Arc<Schema>,
        table_id: TableIdT,
    ) -> Result<Self, IndexError> {
        let header_guard = buffer.create_page(table_id)?;
        if !header_guard.page_id().is_table_header() {
            return Err(IndexError::TableAlreadyExists(table_id));
        }
        {
            let mut data = header_guard.data_mut();
            SlottedPage::new(&mut **data).initialize(PageType::TableHeader, INVALID_PAGE_INDEX)?;
        }
        header_guard.mark_dirty();

        let root_guard = buffer.create_page(table_id)?;
        let root_index = root_guard.page_id().page_index;
        {
            let mut data = root_guard.data_mut();
            SlottedPage::new(&mut **data).initialize(PageType::LeafNode, INVALID_PAGE_INDEX)?;
        }
        root_guard.mark_dirty();
        drop(root_guard);

        {
            let mut data = header_guard.data_mut();
            SlottedPage::new(&mut **data).set_root_page_index(root_index)?;
        }
        drop(header_guard);

        let key_schema = schema.key_schema();
        Ok(Self {
            buffer,
            schema,
            key_schema,
            table_id,
            root_page_index: RwLock::new(root_index),
        })
    }

    /// Open an existing tree by reading the root index from its table-header page.
    pub fn open(
        buffer: Arc<BufferPoolManager>,
        schema: Arc<Schema>,
        table_id: TableIdT,
    ) -> Result<Self, IndexError> {
        let header_id = PageId::table_header(table_id);
        let guard = buffer.fetch_page(header_id)?;
        let root_index = {
            let mut data = guard.data_mut();
            let page = SlottedPage::new(&mut **data);
            let page_type = page.page_type()?;
            if page_type != PageType::TableHeader {
                return Err(IndexError::InvalidPageType {
                    page_id: header_id,
                    actual: page_type,
                });
            }
            page.root_page_index()
        };
        drop(guard);

        let key_schema = schema.key_schema();
        Ok(Self {
            buffer,
            schema,
            key_schema,
            table_id,
            root_page_index: RwLock::new(root_index),
        })
    }

    pub fn table_id(&self) -> TableIdT {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Return the index of the current root page.
    pub fn root_page_index(&self) -> PageIndexT {
        *self.root_page_index.read().unwrap()
    }

    fn root_page_id(&self) -> PageId {
        PageId::new(self.table_id, self.root_page_index())
    }

    /// Return the record with the given primary key, or None.
    pub fn search(&self, key: &Key) -> Result<Option<Record>, IndexError> {
        let mut page_id = self.root_page_id();
        loop {
            let guard = self.buffer.fetch_page(page_id)?;
            let mut data = guard.data_mut();
            match page_type_of(&data)? {
                PageType::LeafNode => {
                    let leaf = LeafNode::attach(page_id, &mut **data, &self.schema)?;
                    return leaf.search(key);
                }
                PageType::InternalNode => {
                    let node = InternalNode::attach(page_id, &mut **data, &self.key_schema)?;
                    let next = node.lookup_child_page(key)?;
                    drop(data);
                    page_id = next;
                }
                actual => return Err(IndexError::InvalidPageType { page_id, actual }),
            }
        }
    }

    /// Overwrite the record whose primary key matches the given record's key. The
    /// record must already exist; updates never move a record between leaves, so a
    /// rewritten payload that exceeds the leaf's capacity is an error.
    pub fn update(&self, new_record: &Record) -> Result<(), IndexError> {
        let key = record::primary_key(new_record, &self.schema)?;
        let size = record::serialize(new_record, &self.schema)?.len();
        if size + SLOT_SIZE > PAGE_SIZE - PAGE_HEADER_SIZE {
            return Err(IndexError::RecordTooLarge { size });
        }

        let mut page_id = self.root_page_id();
        loop {
            let guard = self.buffer.fetch_page(page_id)?;
            let mut data = guard.data_mut();
            match page_type_of(&data)? {
                PageType::LeafNode => {
                    let mut leaf = LeafNode::attach(page_id, &mut **data, &self.schema)?;
                    leaf.update_compacting(new_record)?;
                    drop(data);
                    guard.mark_dirty();
                    return Ok(());
                }
                PageType::InternalNode => {
                    let node = InternalNode::attach(page_id, &mut **data, &self.key_schema)?;
                    let next = node.lookup_child_page(&key)?;
                    drop(data);
                    page_id = next;
                }
                actual => return Err(IndexError::InvalidPageType { page_id, actual }),
            }
        }
    }

    /// Insert a record, splitting nodes and growing a new root as needed.
    pub fn insert(&self, new_record: &Record) -> Result<(), IndexError> {
        let key = record::primary_key(new_record, &self.schema)?;
        let size = record::serialize(new_record, &self.schema)?.len();
        if size + SLOT_SIZE > PAGE_SIZE - PAGE_HEADER_SIZE {
            // TODO: implement overflow pages for records larger than a page.
            return Err(IndexError::RecordTooLarge { size });
        }

        // Descend to the target leaf, keeping the ancestor path pinned so separators
        // always promote into pinned parents.
        let mut ancestors: Vec<PageGuard<'_>> = Vec::new();
        let mut page_id = self.root_page_id();
        let leaf_guard = loop {
            let guard = self.buffer.fetch_page(page_id)?;
            let page_type = {
                let data = guard.data();
                page_type_of(&data)?
            };
            match page_type {
                PageType::LeafNode => break guard,
                PageType::InternalNode => {
                    let next = {
                        let mut data = guard.data_mut();
                        InternalNode::attach(page_id, &mut **data, &self.key_schema)?
                            .lookup_child_page(&key)?
                    };
                    ancestors.push(guard);
                    page_id = next;
                }
                actual => return Err(IndexError::InvalidPageType { page_id, actual }),
            }
        };

        // Fast path: the leaf has room.
        let inserted = {
            let mut data = leaf_guard.data_mut();
            let mut leaf = LeafNode::attach(leaf_guard.page_id(), &mut **data, &self.schema)?;
            leaf.try_insert(new_record)?
        };
        if inserted {
            leaf_guard.mark_dirty();
            return Ok(());
        }

        // The leaf is full: split it, then drive the promotion loop up the pinned path.
        let mut split = self.split_leaf(&leaf_guard, new_record)?;
        leaf_guard.mark_dirty();
        drop(leaf_guard);

        loop {
            match ancestors.pop() {
                None => {
                    self.grow_root(&split)?;
                    return Ok(());
                }
                Some(parent_guard) => {
                    let outcome = self.promote(&parent_guard, &split)?;
                    parent_guard.mark_dirty();
                    drop(parent_guard);
                    match outcome {
                        Some(next_split) => split = next_split,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Split the full leaf behind `leaf_guard` and insert the record during the
    /// redistribution.
    fn split_leaf(
        &self,
        leaf_guard: &PageGuard<'_>,
        new_record: &Record,
    ) -> Result<SplitResult, IndexError> {
        let old_next = {
            let mut data = leaf_guard.data_mut();
            LeafNode::attach(leaf_guard.page_id(), &mut **data, &self.schema)?.next_page_index()
        };
        let sibling_guard = match old_next {
            INVALID_PAGE_INDEX => None,
            index => Some(self.buffer.fetch_page(PageId::new(self.table_id, index))?),
        };
        let new_guard = self.buffer.create_page(self.table_id)?;

        let separator = {
            let mut left_data = leaf_guard.data_mut();
            let mut right_data = new_guard.data_mut();
            let mut left =
                LeafNode::attach(leaf_guard.page_id(), &mut **left_data, &self.schema)?;
            let mut right = LeafNode::initialize(
                new_guard.page_id(),
                &mut **right_data,
                &self.schema,
                left.parent_page_index(),
            )?;
            match &sibling_guard {
                Some(guard) => {
                    let mut sibling_data = guard.data_mut();
                    let mut sibling =
                        LeafNode::attach(guard.page_id(), &mut **sibling_data, &self.schema)?;
                    left.split_and_insert(new_record, &mut right, Some(&mut sibling))?
                }
                None => left.split_and_insert(new_record, &mut right, None)?,
            }
        };
        new_guard.mark_dirty();
        if let Some(guard) = &sibling_guard {
            guard.mark_dirty();
        }

        Ok(SplitResult {
            separator,
            left: leaf_guard.page_id().page_index,
            right: new_guard.page_id().page_index,
        })
    }

    /// Promote a split's separator into the pinned parent node. Returns the next split
    /// to promote if the parent itself had to be divided, or None once the separator has
    /// found a home (including via a new root).
    fn promote(
        &self,
        parent_guard: &PageGuard<'_>,
        split: &SplitResult,
    ) -> Result<Option<SplitResult>, IndexError> {
        let parent_id = parent_guard.page_id();
        let left_child = PageId::new(self.table_id, split.left);
        let right_child = PageId::new(self.table_id, split.right);

        {
            let mut data = parent_guard.data_mut();
            let mut parent = InternalNode::attach(parent_id, &mut **data, &self.key_schema)?;

            // Re-point the separator's right-hand neighbor at the new right child
            // before the separator itself is inserted.
            let index = parent.find_slot_index(&split.separator)?;
            if index >= 0 {
                return Err(IndexError::InvariantViolation(format!(
                    "promoted separator already present in parent page {}",
                    parent_id
                )));
            }
            let at = !index as usize;
            match at == parent.item_count() {
                true => parent.set_rightmost_child_index(right_child.page_index)?,
                false => parent.set_child_at(at, right_child)?,
            }

            if parent.try_insert(&split.separator, left_child)? {
                return Ok(None);
            }
        }

        // The parent is full too: divide it and hand its median upward.
        let new_guard = self.buffer.create_page(self.table_id)?;
        let (new_separator, parent_was_root) = {
            let mut parent_data = parent_guard.data_mut();
            let mut right_data = new_guard.data_mut();
            let mut parent =
                InternalNode::attach(parent_id, &mut **parent_data, &self.key_schema)?;
            let mut right = InternalNode::initialize(
                new_guard.page_id(),
                &mut **right_data,
                &self.key_schema,
                parent.parent_page_index(),
            )?;
            let separator = parent.split_and_insert(&split.separator, left_child, &mut right)?;
            (separator, parent.parent_page_index() == INVALID_PAGE_INDEX)
        };
        new_guard.mark_dirty();

        // Children handed to the new right sibling must adopt it as their parent.
        let moved_children = {
            let mut right_data = new_guard.data_mut();
            InternalNode::attach(new_guard.page_id(), &mut **right_data, &self.key_schema)?
                .children()?
        };
        let right_index = new_guard.page_id().page_index;
        drop(new_guard);
        for child in moved_children {
            self.set_parent(child, right_index)?;
        }

        let next_split = SplitResult {
            separator: new_separator,
            left: parent_id.page_index,
            right: right_index,
        };
        match parent_was_root {
            true => {
                self.grow_root(&next_split)?;
                Ok(None)
            }
            false => Ok(Some(next_split)),
        }
    }

    /// Install a new internal root above the two halves of a root split and rotate the
    /// tree's root pointer, both in memory and in the table-header page.
    fn grow_root(&self, split: &SplitResult) -> Result<(), IndexError> {
        let root_guard = self.buffer.create_page(self.table_id)?;
        let root_index = root_guard.page_id().page_index;
        {
            let mut data = root_guard.data_mut();
            let mut root = InternalNode::initialize(
                root_guard.page_id(),
                &mut **data,
                &self.key_schema,
                INVALID_PAGE_INDEX,
            )?;
            if !root.try_insert(&split.separator, PageId::new(self.table_id, split.left))? {
                return Err(IndexError::InvariantViolation(
                    "separator did not fit in a fresh root".to_string(),
                ));
            }
            root.set_rightmost_child_index(split.right)?;
        }
        root_guard.mark_dirty();
        drop(root_guard);

        for child_index in [split.left, split.right] {
            self.set_parent(PageId::new(self.table_id, child_index), root_index)?;
        }
        self.set_root(root_index)
    }

    /// Rewrite a page's parent pointer through the buffer pool.
    fn set_parent(&self, page_id: PageId, parent_index: PageIndexT) -> Result<(), IndexError> {
        let guard = self.buffer.fetch_page(page_id)?;
        {
            let mut data = guard.data_mut();
            SlottedPage::new(&mut **data).set_parent_page_index(parent_index)?;
        }
        guard.mark_dirty();
        Ok(())
    }

    /// Record a new root index in the table-header page and the in-memory pointer.
    fn set_root(&self, root_index: PageIndexT) -> Result<(), IndexError> {
        let header_id = PageId::table_header(self.table_id);
        let guard = self.buffer.fetch_page(header_id)?;
        {
            let mut data = guard.data_mut();
            let mut page = SlottedPage::new(&mut **data);
            let page_type = page.page_type()?;
            if page_type != PageType::TableHeader {
                return Err(IndexError::InvalidPageType {
                    page_id: header_id,
                    actual: page_type,
                });
            }
            page.set_root_page_index(root_index)?;
        }
        guard.mark_dirty();
        *self.root_page_index.write().unwrap() = root_index;
        Ok(())
    }

    /// Scan records in key order between the optional bounds.
    pub fn scan(
        &self,
        min: Option<Key>,
        min_inclusive: bool,
        max: Option<Key>,
        max_inclusive: bool,
    ) -> Result<RangeScan, IndexError> {
        if let (Some(min_key), Some(max_key)) = (&min, &max) {
            if min_key.compare(max_key)? == Ordering::Greater {
                return Ok(self.empty_scan());
            }
        }

        // Seed at the leaf that would contain the lower bound, descending the leftmost
        // path when the scan is unbounded below.
        let mut page_id = self.root_page_id();
        let (leaf_index, start_slot) = loop {
            let guard = self.buffer.fetch_page(page_id)?;
            let mut data = guard.data_mut();
            match page_type_of(&data)? {
                PageType::LeafNode => {
                    let leaf = LeafNode::attach(page_id, &mut **data, &self.schema)?;
                    let start = match &min {
                        None => 0,
                        Some(min_key) => {
                            let index = leaf.find_slot_index(min_key)?;
                            if index >= 0 {
                                match min_inclusive {
                                    true => index as usize,
                                    false => index as usize + 1,
                                }
                            } else {
                                !index as usize
                            }
                        }
                    };
                    break (page_id.page_index, start);
                }
                PageType::InternalNode => {
                    let node = InternalNode::attach(page_id, &mut **data, &self.key_schema)?;
                    let next = match &min {
                        None => node.first_child()?,
                        Some(min_key) => node.lookup_child_page(min_key)?,
                    };
                    drop(data);
                    page_id = next;
                }
                actual => return Err(IndexError::InvalidPageType { page_id, actual }),
            }
        };

        Ok(RangeScan {
            buffer: self.buffer.clone(),
            schema: self.schema.clone(),
            table_id: self.table_id,
            next_leaf: leaf_index,
            next_slot: start_slot,
            max,
            max_inclusive,
            buffered: VecDeque::new(),
            finished: false,
        })
    }

    fn empty_scan(&self) -> RangeScan {
        RangeScan {
            buffer: self.buffer.clone(),
            schema: self.schema.clone(),
            table_id: self.table_id,
            next_leaf: INVALID_PAGE_INDEX,
            next_slot: 0,
            max: None,
            max_inclusive: true,
            buffered: VecDeque::new(),
            finished: true,
        }
    }

    /// Scan the whole relation and return the records whose value in the named column
    /// equals the given value; nulls compare equal to each other. Used by the catalog
    /// lookup path.
    pub fn scan_column(&self, column_name: &str, value: &Value) -> Result<Vec<Record>, IndexError> {
        let column_index = self
            .schema
            .column_index(column_name)
            .ok_or_else(|| RelationError::UnknownColumn(column_name.to_string()))?;
        let mut matches = Vec::new();
        for result in self.scan(None, true, None, true)? {
            let found = result?;
            if found.value(column_index).compare(value)? == Ordering::Equal {
                matches.push(found);
            }
        }
        Ok(matches)
    }
}

/// An in-order iterator over a key range of a B+Tree.
///
/// The iterator follows the leaf chain, pinning one leaf at a time: each refill decodes
/// the qualifying records out of the current leaf and unpins it before any of them are
/// yielded.
pub struct RangeScan {
    buffer: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    table_id: TableIdT,
    next_leaf: PageIndexT,
    next_slot: usize,
    max: Option<Key>,
    max_inclusive: bool,
    buffered: VecDeque<Record>,
    finished: bool,
}

impl RangeScan {
    /// Decode the next leaf's qualifying records into the buffer.
    fn refill(&mut self) -> Result<(), IndexError> {
        while self.buffered.is_empty() && !self.finished {
            if self.next_leaf == INVALID_PAGE_INDEX {
                self.finished = true;
                return Ok(());
            }
            let page_id = PageId::new(self.table_id, self.next_leaf);
            let guard = self.buffer.fetch_page(page_id)?;
            let mut data = guard.data_mut();
            let leaf = LeafNode::attach(page_id, &mut **data, &self.schema)?;

            for slot in self.next_slot..leaf.item_count() {
                let raw = leaf.raw_record_at(slot)?;
                if raw.is_empty() {
                    continue;
                }
                let found = record::deserialize(raw, &self.schema)?;
                if let Some(max_key) = &self.max {
                    let key = record::primary_key(&found, &self.schema)?;
                    let ordering = key.compare(max_key)?;
                    let past_end = match self.max_inclusive {
                        true => ordering == Ordering::Greater,
                        false => ordering != Ordering::Less,
                    };
                    if past_end {
                        self.finished = true;
                        break;
                    }
                }
                self.buffered.push_back(found);
            }
            self.next_leaf = leaf.next_page_index();
            self.next_slot = 0;
        }
        Ok(())
    }
}

impl Iterator for RangeScan {
    type Item = Result<Record, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.buffered.pop_front() {
                return Some(Ok(found));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.refill() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::relation::column::Column;
    use crate::relation::types::DataType;
    use tempfile::TempDir;

    struct TestContext {
        _dir: TempDir,
        buffer: Arc<BufferPoolManager>,
    }

    fn setup() -> TestContext {
        let dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::new(dir.path()).unwrap();
        TestContext {
            _dir: dir,
            buffer: Arc::new(BufferPoolManager::new(32, disk_manager)),
        }
    }

    fn wide_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                vec![
                    Column::new("k", DataType::Varchar, false).with_max_length(3000),
                    Column::new("v", DataType::Int, false),
                ],
                &["k"],
            )
            .unwrap(),
        )
    }

    /// Walk the whole tree checking that every node's slots are in ascending key order
    /// and that every child's parent pointer references the node it hangs from.
    fn check_subtree(tree: &BTree, page_id: PageId, expected_parent: PageIndexT) {
        let guard = tree.buffer.fetch_page(page_id).unwrap();
        let mut data = guard.data_mut();
        match page_type_of(&data).unwrap() {
            PageType::LeafNode => {
                let leaf = LeafNode::attach(page_id, &mut data, &tree.schema).unwrap();
                assert_eq!(leaf.parent_page_index(), expected_parent, "leaf {}", page_id);
                for i in 1..leaf.item_count() {
                    let prev = leaf.key_at(i - 1).unwrap();
                    let next = leaf.key_at(i).unwrap();
                    assert_eq!(prev.compare(&next).unwrap(), Ordering::Less);
                }
            }
            PageType::InternalNode => {
                let node = InternalNode::attach(page_id, &mut data, &tree.key_schema).unwrap();
                assert_eq!(node.parent_page_index(), expected_parent, "node {}", page_id);
                for i in 1..node.item_count() {
                    let prev = node.key_at(i - 1).unwrap();
                    let next = node.key_at(i).unwrap();
                    assert_eq!(prev.compare(&next).unwrap(), Ordering::Less);
                }
                let children = node.children().unwrap();
                drop(data);
                drop(guard);
                for child in children {
                    check_subtree(tree, child, page_id.page_index);
                }
            }
            other => panic!("unexpected page type {:?}", other),
        }
    }

    /// Follow the leaf chain from the leftmost leaf and return every key in order.
    fn chain_keys(tree: &BTree) -> Vec<Key> {
        let mut page_id = tree.root_page_id();
        loop {
            let guard = tree.buffer.fetch_page(page_id).unwrap();
            let mut data = guard.data_mut();
            match page_type_of(&data).unwrap() {
                PageType::LeafNode => break,
                PageType::InternalNode => {
                    let node =
                        InternalNode::attach(page_id, &mut data, &tree.key_schema).unwrap();
                    let next = node.first_child().unwrap();
                    drop(data);
                    page_id = next;
                }
                other => panic!("unexpected page type {:?}", other),
            }
        }

        let mut keys = Vec::new();
        let mut leaf_index = page_id.page_index;
        while leaf_index != INVALID_PAGE_INDEX {
            let leaf_id = PageId::new(tree.table_id, leaf_index);
            let guard = tree.buffer.fetch_page(leaf_id).unwrap();
            let mut data = guard.data_mut();
            let leaf = LeafNode::attach(leaf_id, &mut data, &tree.schema).unwrap();
            for i in 0..leaf.item_count() {
                keys.push(leaf.key_at(i).unwrap());
            }
            leaf_index = leaf.next_page_index();
        }
        keys
    }

    #[test]
    fn test_structure_invariants_after_deep_splits() {
        let ctx = setup();
        let schema = wide_schema();
        let tree = BTree::create(ctx.buffer.clone(), schema.clone(), 100).unwrap();

        let letters = [
            "M", "A", "S", "C", "Q", "E", "O", "G", "K", "I", "W", "U", "Y", "B", "D",
        ];
        for (i, letter) in letters.iter().enumerate() {
            let record = Record::new(vec![
                Value::Varchar(letter.repeat(3000)),
                Value::Int(i as i32),
            ]);
            tree.insert(&record).unwrap();

            // Invariants hold after every single insert, not just at the end.
            check_subtree(&tree, tree.root_page_id(), INVALID_PAGE_INDEX);
        }

        // The leaf chain yields every key in globally ascending order.
        let keys = chain_keys(&tree);
        assert_eq!(keys.len(), letters.len());
        for i in 1..keys.len() {
            assert_eq!(keys[i - 1].compare(&keys[i]).unwrap(), Ordering::Less);
        }

        // Every fetched page was unpinned along the way.
        for index in 0..16 {
            let page_id = PageId::new(100, index);
            if let Some(pins) = tree.buffer.pin_count(page_id) {
                assert_eq!(pins, 0, "page {} still pinned", page_id);
            }
        }
    }

    #[test]
    fn test_create_rejects_existing_table() {
        let ctx = setup();
        let schema = wide_schema();
        let _tree = BTree::create(ctx.buffer.clone(), schema.clone(), 100).unwrap();

        let result = BTree::create(ctx.buffer.clone(), schema, 100);
        assert!(matches!(result, Err(IndexError::TableAlreadyExists(100))));
    }
}
