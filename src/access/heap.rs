use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::access::value::{RowId, Tuple};
use crate::error::{Error, Result};
use crate::storage::buffer::pool::BufferPoolManager;
use crate::storage::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// On-page representation of one heap page: a link to the next page in the
/// chain and the encoded rows stored on this page, bincode-encoded at
/// offset zero of the page.
#[derive(Debug, Serialize, Deserialize)]
struct HeapPageData {
    next_page_id: PageId,
    rows: Vec<Vec<u8>>,
}

impl HeapPageData {
    fn empty() -> HeapPageData {
        HeapPageData { next_page_id: INVALID_PAGE_ID, rows: Vec::new() }
    }

    fn decode(data: &[u8]) -> Result<HeapPageData> {
        Ok(bincode::deserialize(data)?)
    }

    fn encode(&self, data: &mut [u8]) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        if bytes.len() > data.len() {
            return Err(Error::internal(format!(
                "heap page encoding of {} bytes exceeds the page size",
                bytes.len()
            )));
        }
        data[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Whether the page still fits after appending one more row: the
    /// current encoding plus the row's length prefix and payload.
    fn fits(&self, row: &[u8]) -> Result<bool> {
        let size = bincode::serialized_size(self)? + 8 + row.len() as u64;
        Ok(size <= PAGE_SIZE as u64)
    }
}

/// Tuple storage over the buffer pool: a singly linked chain of heap
/// pages. Rows are bincode-encoded tuples appended to the first page in
/// the chain with room.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
}

impl TableHeap {
    /// Create a heap with a single empty page.
    pub fn new(bpm: Arc<BufferPoolManager>) -> Result<TableHeap> {
        let page = bpm.new_page()?;
        let first_page_id = page.read()?.id;
        let mut guard = page.write()?;
        HeapPageData::empty().encode(&mut guard.data)?;
        drop(guard);
        bpm.unpin_page(first_page_id, true);
        Ok(TableHeap { bpm, first_page_id })
    }

    /// Open an existing heap rooted at first_page_id.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> TableHeap {
        TableHeap { bpm, first_page_id }
    }

    /// The page id of the first page in the chain, the root of the heap on
    /// disk.
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Append a tuple to the heap, linking in a fresh page when the tail
    /// is full. Returns the inserted tuple's row id.
    pub fn insert_tuple(&self, tuple: &Tuple) -> Result<RowId> {
        let row = bincode::serialize(tuple)?;
        if !HeapPageData::empty().fits(&row)? {
            return Err(Error::value(format!(
                "tuple of {} bytes does not fit in one page",
                row.len()
            )));
        }

        let mut page_id = self.first_page_id;
        loop {
            let page = self.bpm.fetch_page(page_id)?;
            let mut guard = page.write()?;
            let mut heap_page = HeapPageData::decode(&guard.data)?;

            if heap_page.fits(&row)? {
                heap_page.rows.push(row);
                heap_page.encode(&mut guard.data)?;
                drop(guard);
                self.bpm.unpin_page(page_id, true);
                return Ok(RowId { page_id, slot: (heap_page.rows.len() - 1) as u32 });
            }

            if heap_page.next_page_id != INVALID_PAGE_ID {
                let next_page_id = heap_page.next_page_id;
                drop(guard);
                self.bpm.unpin_page(page_id, false);
                page_id = next_page_id;
                continue;
            }

            // the tail is full: link in a fresh page and move to it
            let new_page = self.bpm.new_page()?;
            let new_page_id = new_page.read()?.id;
            let mut new_guard = new_page.write()?;
            HeapPageData::empty().encode(&mut new_guard.data)?;
            drop(new_guard);

            heap_page.next_page_id = new_page_id;
            heap_page.encode(&mut guard.data)?;
            drop(guard);
            self.bpm.unpin_page(page_id, true);
            self.bpm.unpin_page(new_page_id, true);
            page_id = new_page_id;
        }
    }

    /// Iterate the heap in chain order.
    pub fn scan(&self) -> TableIter {
        TableIter {
            bpm: Arc::clone(&self.bpm),
            next_page_id: self.first_page_id,
            current: VecDeque::new(),
        }
    }
}

/// Iterator over every tuple in a table heap. Decodes one page at a time
/// and unpins it before yielding, so no pin is held between calls.
pub struct TableIter {
    bpm: Arc<BufferPoolManager>,
    next_page_id: PageId,
    current: VecDeque<(RowId, Tuple)>,
}

impl TableIter {
    fn load_next_page(&mut self) -> Result<()> {
        let page = self.bpm.fetch_page(self.next_page_id)?;
        let guard = page.read()?;
        let heap_page = HeapPageData::decode(&guard.data)?;
        drop(guard);
        self.bpm.unpin_page(self.next_page_id, false);

        for (slot, row) in heap_page.rows.iter().enumerate() {
            let tuple: Tuple = bincode::deserialize(row)?;
            let row_id = RowId { page_id: self.next_page_id, slot: slot as u32 };
            self.current.push_back((row_id, tuple));
        }
        self.next_page_id = heap_page.next_page_id;
        Ok(())
    }
}

impl Iterator for TableIter {
    type Item = Result<(RowId, Tuple)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current.is_empty() {
            if self.next_page_id == INVALID_PAGE_ID {
                return None;
            }
            if let Err(err) = self.load_next_page() {
                return Some(Err(err));
            }
        }
        self.current.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::r#type::Value;
    use crate::storage::memory::MemoryDisk;
    use crate::storage::DiskManager;

    fn new_bpm(pool_size: usize) -> Arc<BufferPoolManager> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        Arc::new(BufferPoolManager::new(disk, pool_size))
    }

    fn row(id: i64, title: &str) -> Tuple {
        Tuple::from(vec![Value::Integer(id), Value::String(title.to_string())])
    }

    #[test]
    fn test_insert_and_scan() -> Result<()> {
        let bpm = new_bpm(4);
        let heap = TableHeap::new(bpm)?;

        let r0 = heap.insert_tuple(&row(1, "a"))?;
        let r1 = heap.insert_tuple(&row(2, "b"))?;
        assert_eq!(r0.page_id, r1.page_id);
        assert_eq!(0, r0.slot);
        assert_eq!(1, r1.slot);

        let rows = heap.scan().collect::<Result<Vec<_>>>()?;
        assert_eq!(vec![(r0, row(1, "a")), (r1, row(2, "b"))], rows);

        Ok(())
    }

    #[test]
    fn test_spills_across_pages() -> Result<()> {
        // a small pool, so scanning and inserting cross eviction traffic
        let bpm = new_bpm(4);
        let heap = TableHeap::new(Arc::clone(&bpm))?;

        // a few hundred ~40 byte rows do not fit in a single 4 KiB page
        let count = 300;
        let mut row_ids = Vec::new();
        for i in 0..count {
            row_ids.push(heap.insert_tuple(&row(i, &format!("title-{}", i)))?);
        }
        assert!(row_ids.iter().any(|r| r.page_id != heap.first_page_id()));

        let rows = heap.scan().collect::<Result<Vec<_>>>()?;
        assert_eq!(count as usize, rows.len());
        for (i, (row_id, tuple)) in rows.iter().enumerate() {
            assert_eq!(row_ids[i], *row_id);
            assert_eq!(row(i as i64, &format!("title-{}", i)), *tuple);
        }

        Ok(())
    }

    #[test]
    fn test_oversized_tuple_rejected() -> Result<()> {
        let bpm = new_bpm(4);
        let heap = TableHeap::new(bpm)?;

        let huge = Tuple::from(vec![Value::String("x".repeat(PAGE_SIZE))]);
        assert!(heap.insert_tuple(&huge).is_err());

        Ok(())
    }

    #[test]
    fn test_open_existing_heap() -> Result<()> {
        let bpm = new_bpm(4);
        let heap = TableHeap::new(Arc::clone(&bpm))?;
        heap.insert_tuple(&row(7, "persisted"))?;
        let root = heap.first_page_id();
        drop(heap);

        let heap = TableHeap::open(bpm, root);
        let rows = heap.scan().collect::<Result<Vec<_>>>()?;
        assert_eq!(1, rows.len());
        assert_eq!(row(7, "persisted"), rows[0].1);

        Ok(())
    }
}
