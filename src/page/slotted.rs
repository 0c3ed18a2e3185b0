use crate::common::codec;
use crate::common::{PageBuf, PageIndexT, INVALID_PAGE_INDEX, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};
use crate::page::{
    PageError, PageType, DATA_START_OFFSET, ITEM_COUNT_OFFSET, PAGE_LSN_OFFSET,
    PAGE_TYPE_OFFSET, PARENT_PAGE_INDEX_OFFSET, TYPE_PTR_1_OFFSET, TYPE_PTR_2_OFFSET,
};

/// A view over a raw page buffer with slotted-page architecture. Gets written out to disk
/// by the disk manager.
///
/// Contains a header, a slot array, and variable-length records that grow in opposite
/// directions, similarly to a heap and stack. Each slot is an offset/length pair pointing
/// into the record heap; the order of the slot array is the logical (sorted) order of the
/// records, independent of their physical placement.
///
/// Data format:
/// +------------------------------+--------------+---------------------+
/// |  HEADER | SLOTS (grows ->)   | ... FREE ... | (<- grows) RECORDS  |
/// +------------------------------+--------------+---------------------+
///                                               ^ Data Start Offset
///
/// Deleting a record merely zeroes its slot (a tombstone); heap space is reclaimed only
/// when the page is rewritten via `repopulate` by the index layer.
pub struct SlottedPage<'a> {
    data: &'a mut PageBuf,
}

impl<'a> SlottedPage<'a> {
    /// Wrap an existing page buffer. No validation is performed; callers are expected to
    /// check the page type before interpreting the contents.
    pub fn new(data: &'a mut PageBuf) -> Self {
        Self { data }
    }

    /// Format the page as an empty page of the given variant.
    ///
    /// The header is zeroed, the item count is reset, and the data-start pointer is moved
    /// to the end of the page. Leaf nodes start with unlinked sibling pointers, internal
    /// nodes with no rightmost child, and table-header pages with no recorded root.
    pub fn initialize(
        &mut self,
        kind: PageType,
        parent_page_index: PageIndexT,
    ) -> Result<(), PageError> {
        if kind == PageType::Invalid {
            return Err(PageError::InvalidInitialization(kind));
        }

        self.data[..PAGE_HEADER_SIZE].fill(0);
        codec::write_u64(self.data, PAGE_LSN_OFFSET, 0)?;
        codec::write_i32(self.data, ITEM_COUNT_OFFSET, 0)?;
        codec::write_i32(self.data, DATA_START_OFFSET, PAGE_SIZE as i32)?;
        codec::write_i32(self.data, PARENT_PAGE_INDEX_OFFSET, parent_page_index)?;
        self.data[PAGE_TYPE_OFFSET] = kind as u8;

        match kind {
            PageType::LeafNode => {
                codec::write_i32(self.data, TYPE_PTR_1_OFFSET, INVALID_PAGE_INDEX)?;
                codec::write_i32(self.data, TYPE_PTR_2_OFFSET, INVALID_PAGE_INDEX)?;
            }
            PageType::InternalNode | PageType::TableHeader => {
                codec::write_i32(self.data, TYPE_PTR_1_OFFSET, INVALID_PAGE_INDEX)?;
            }
            PageType::Invalid => unreachable!(),
        }
        Ok(())
    }

    /// Return the page's variant.
    pub fn page_type(&self) -> Result<PageType, PageError> {
        PageType::from_tag(self.data[PAGE_TYPE_OFFSET])
    }

    /// Return the number of slots in the page.
    pub fn item_count(&self) -> usize {
        codec::read_i32(self.data, ITEM_COUNT_OFFSET).unwrap_or(0).max(0) as usize
    }

    fn set_item_count(&mut self, count: usize) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, ITEM_COUNT_OFFSET, count as i32)?)
    }

    /// Return the offset where the record heap begins.
    pub fn data_start_offset(&self) -> usize {
        codec::read_i32(self.data, DATA_START_OFFSET).unwrap_or(0).max(0) as usize
    }

    fn set_data_start_offset(&mut self, offset: usize) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, DATA_START_OFFSET, offset as i32)?)
    }

    /// Return the parent page index, or INVALID_PAGE_INDEX if this page is a root.
    pub fn parent_page_index(&self) -> PageIndexT {
        codec::read_i32(self.data, PARENT_PAGE_INDEX_OFFSET).unwrap_or(INVALID_PAGE_INDEX)
    }

    /// Set the parent page index.
    pub fn set_parent_page_index(&mut self, index: PageIndexT) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, PARENT_PAGE_INDEX_OFFSET, index)?)
    }

    /// Return the previous sibling index of a leaf page.
    pub fn prev_page_index(&self) -> PageIndexT {
        codec::read_i32(self.data, TYPE_PTR_1_OFFSET).unwrap_or(INVALID_PAGE_INDEX)
    }

    /// Set the previous sibling index of a leaf page.
    pub fn set_prev_page_index(&mut self, index: PageIndexT) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, TYPE_PTR_1_OFFSET, index)?)
    }

    /// Return the next sibling index of a leaf page.
    pub fn next_page_index(&self) -> PageIndexT {
        codec::read_i32(self.data, TYPE_PTR_2_OFFSET).unwrap_or(INVALID_PAGE_INDEX)
    }

    /// Set the next sibling index of a leaf page.
    pub fn set_next_page_index(&mut self, index: PageIndexT) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, TYPE_PTR_2_OFFSET, index)?)
    }

    /// Return the rightmost child index of an internal page.
    pub fn rightmost_child_index(&self) -> PageIndexT {
        codec::read_i32(self.data, TYPE_PTR_1_OFFSET).unwrap_or(INVALID_PAGE_INDEX)
    }

    /// Set the rightmost child index of an internal page.
    pub fn set_rightmost_child_index(&mut self, index: PageIndexT) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, TYPE_PTR_1_OFFSET, index)?)
    }

    /// Return the root page index recorded in a table-header page.
    pub fn root_page_index(&self) -> PageIndexT {
        codec::read_i32(self.data, TYPE_PTR_1_OFFSET).unwrap_or(INVALID_PAGE_INDEX)
    }

    /// Record the root page index in a table-header page.
    pub fn set_root_page_index(&mut self, index: PageIndexT) -> Result<(), PageError> {
        Ok(codec::write_i32(self.data, TYPE_PTR_1_OFFSET, index)?)
    }

    /// Return the number of free bytes between the end of the slot array and the start of
    /// the record heap.
    pub fn free_space(&self) -> usize {
        let end_of_slots = PAGE_HEADER_SIZE + self.item_count() * SLOT_SIZE;
        self.data_start_offset().saturating_sub(end_of_slots)
    }

    /// Read the slot at the given index as an (offset, length) pair.
    fn slot(&self, index: usize) -> Result<(i32, i32), PageError> {
        let count = self.item_count();
        if index >= count {
            return Err(PageError::SlotOutOfBounds { index, count });
        }
        let base = PAGE_HEADER_SIZE + index * SLOT_SIZE;
        let offset = codec::read_i32(self.data, base)?;
        let length = codec::read_i32(self.data, base + 4)?;
        Ok((offset, length))
    }

    fn set_slot(&mut self, index: usize, offset: i32, length: i32) -> Result<(), PageError> {
        let base = PAGE_HEADER_SIZE + index * SLOT_SIZE;
        codec::write_i32(self.data, base, offset)?;
        codec::write_i32(self.data, base + 4, length)?;
        Ok(())
    }

    /// Try to add a record at the given slot index, shifting any later slots to the right.
    /// Returns false (without mutating the page) if the record and its slot do not fit in
    /// the free space. The slot index must lie within [0, item_count].
    pub fn try_add_record(&mut self, record: &[u8], at_index: usize) -> Result<bool, PageError> {
        let count = self.item_count();
        if at_index > count {
            return Err(PageError::SlotOutOfBounds {
                index: at_index,
                count,
            });
        }
        if record.len() + SLOT_SIZE > self.free_space() {
            return Ok(false);
        }

        // Write the record just below the current heap start.
        let new_start = self.data_start_offset() - record.len();
        codec::write_bytes(self.data, new_start, record)?;

        // Shift slots [at_index, count) one slot to the right and write the new slot.
        let src = PAGE_HEADER_SIZE + at_index * SLOT_SIZE;
        let end = PAGE_HEADER_SIZE + count * SLOT_SIZE;
        self.data.copy_within(src..end, src + SLOT_SIZE);
        self.set_slot(at_index, new_start as i32, record.len() as i32)?;

        self.set_item_count(count + 1)?;
        self.set_data_start_offset(new_start)?;
        Ok(true)
    }

    /// Return a zero-copy view of the record at the given slot index. A tombstoned slot
    /// yields an empty slice.
    pub fn get_record(&self, index: usize) -> Result<&[u8], PageError> {
        let (offset, length) = self.slot(index)?;
        if length == 0 {
            return Ok(&[]);
        }
        let (offset, length) = (offset as usize, length as usize);
        if offset < PAGE_HEADER_SIZE || offset + length > PAGE_SIZE || offset < self.data_start_offset() {
            return Err(PageError::CorruptSlot {
                index,
                offset: offset as i32,
                length: length as i32,
            });
        }
        Ok(&self.data[offset..offset + length])
    }

    /// Tombstone the record at the given slot index. Heap space is not reclaimed.
    pub fn delete_record(&mut self, index: usize) -> Result<(), PageError> {
        self.slot(index)?;
        self.set_slot(index, 0, 0)
    }

    /// Try to overwrite the record at the given slot index. If the new payload fits into
    /// the record's existing heap allocation it is written in place; otherwise a fresh
    /// heap allocation is made, returning false if there is no room for one.
    pub fn try_update_record(&mut self, index: usize, record: &[u8]) -> Result<bool, PageError> {
        let (offset, length) = self.slot(index)?;
        if record.len() <= length as usize {
            codec::write_bytes(self.data, offset as usize, record)?;
            self.set_slot(index, offset, record.len() as i32)?;
            return Ok(true);
        }
        if record.len() > self.free_space() {
            return Ok(false);
        }
        let new_start = self.data_start_offset() - record.len();
        codec::write_bytes(self.data, new_start, record)?;
        self.set_slot(index, new_start as i32, record.len() as i32)?;
        self.set_data_start_offset(new_start)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PAGE_SIZE;

    fn leaf_page(buf: &mut PageBuf) -> SlottedPage<'_> {
        let mut page = SlottedPage::new(buf);
        page.initialize(PageType::LeafNode, INVALID_PAGE_INDEX).unwrap();
        page
    }

    #[test]
    fn test_initialize() {
        let mut buf = [0xff; PAGE_SIZE];
        let page = leaf_page(&mut buf);

        assert_eq!(page.page_type().unwrap(), PageType::LeafNode);
        assert_eq!(page.item_count(), 0);
        assert_eq!(page.data_start_offset(), PAGE_SIZE);
        assert_eq!(page.parent_page_index(), INVALID_PAGE_INDEX);
        assert_eq!(page.prev_page_index(), INVALID_PAGE_INDEX);
        assert_eq!(page.next_page_index(), INVALID_PAGE_INDEX);
        assert_eq!(page.free_space(), PAGE_SIZE - PAGE_HEADER_SIZE);
    }

    #[test]
    fn test_initialize_invalid_rejected() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut buf);
        assert!(page.initialize(PageType::Invalid, INVALID_PAGE_INDEX).is_err());
    }

    #[test]
    fn test_add_and_get_records() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        assert!(page.try_add_record(b"bravo", 0).unwrap());
        assert!(page.try_add_record(b"alpha", 0).unwrap());
        assert!(page.try_add_record(b"charlie", 2).unwrap());

        // Slot order is logical order, not insertion order.
        assert_eq!(page.get_record(0).unwrap(), b"alpha");
        assert_eq!(page.get_record(1).unwrap(), b"bravo");
        assert_eq!(page.get_record(2).unwrap(), b"charlie");
        assert_eq!(page.item_count(), 3);

        let used = 5 + 5 + 7 + 3 * SLOT_SIZE;
        assert_eq!(page.free_space(), PAGE_SIZE - PAGE_HEADER_SIZE - used);
    }

    #[test]
    fn test_add_record_out_of_bounds_index() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);
        assert!(page.try_add_record(b"x", 1).is_err());
    }

    #[test]
    fn test_add_record_page_overflow() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        let half = vec![7u8; (PAGE_SIZE - PAGE_HEADER_SIZE) / 2];
        assert!(page.try_add_record(&half, 0).unwrap());
        assert!(!page.try_add_record(&half, 1).unwrap());

        // The failed insertion must not mutate the page.
        assert_eq!(page.item_count(), 1);
        assert_eq!(page.get_record(0).unwrap(), half.as_slice());
    }

    #[test]
    fn test_delete_record_tombstones() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        page.try_add_record(b"alpha", 0).unwrap();
        page.try_add_record(b"bravo", 1).unwrap();
        let free_before = page.free_space();

        page.delete_record(0).unwrap();

        // The slot is tombstoned in place; no space is reclaimed.
        assert_eq!(page.item_count(), 2);
        assert_eq!(page.get_record(0).unwrap(), b"");
        assert_eq!(page.get_record(1).unwrap(), b"bravo");
        assert_eq!(page.free_space(), free_before);
    }

    #[test]
    fn test_update_record_in_place() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        page.try_add_record(b"hello", 0).unwrap();
        let free_before = page.free_space();

        assert!(page.try_update_record(0, b"bye").unwrap());
        assert_eq!(page.get_record(0).unwrap(), b"bye");
        // An in-place update reuses the existing heap allocation.
        assert_eq!(page.free_space(), free_before);
    }

    #[test]
    fn test_update_record_relocates() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        page.try_add_record(b"tiny", 0).unwrap();
        assert!(page.try_update_record(0, b"a considerably longer payload").unwrap());
        assert_eq!(page.get_record(0).unwrap(), b"a considerably longer payload");
    }

    #[test]
    fn test_update_record_no_room() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = leaf_page(&mut buf);

        page.try_add_record(b"small", 0).unwrap();
        let huge = vec![1u8; PAGE_SIZE];
        assert!(!page.try_update_record(0, &huge).unwrap());
        assert_eq!(page.get_record(0).unwrap(), b"small");
    }

    #[test]
    fn test_header_pointer_accessors() {
        let mut buf = [0; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut buf);
        page.initialize(PageType::InternalNode, 3).unwrap();

        assert_eq!(page.parent_page_index(), 3);
        assert_eq!(page.rightmost_child_index(), INVALID_PAGE_INDEX);

        page.set_rightmost_child_index(17).unwrap();
        assert_eq!(page.rightmost_child_index(), 17);

        page.set_parent_page_index(INVALID_PAGE_INDEX).unwrap();
        assert_eq!(page.parent_page_index(), INVALID_PAGE_INDEX);
    }
}
