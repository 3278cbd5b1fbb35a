use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::page::{block_capacity, entry_size, BlockPage, HeaderPage};
use crate::index::HashFn;
use crate::storage::buffer::pool::BufferPoolManager;
use crate::storage::page::PageId;

/// A hash index persisted through the buffer pool: one header page holding
/// the ordered block page id list, and one block page per bucket.
///
/// Probing is single-bucket: a key hashes to exactly one bucket and all
/// slot scanning happens inside that bucket's block page. Overflowing a
/// bucket fails the insert rather than spilling into a neighbour.
///
/// Concurrency relies on the buffer pool's internal lock plus the
/// fetch/unpin discipline; mutating the same bucket from multiple threads
/// requires external serialization.
pub struct LinearHashTable<K, V> {
    bpm: Arc<BufferPoolManager>,
    hash_fn: Box<dyn HashFn<K>>,
    header_page_id: PageId,
    slots_per_block: usize,
    entry_size: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> LinearHashTable<K, V>
where
    K: Serialize + DeserializeOwned + Default + PartialEq,
    V: Serialize + DeserializeOwned + Default + PartialEq,
{
    /// Create a new index with num_buckets buckets: allocates the header
    /// page and one zeroed block page per bucket, then unpins all of them.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        num_buckets: usize,
        hash_fn: Box<dyn HashFn<K>>,
    ) -> Result<Self> {
        if num_buckets == 0 {
            return Err(Error::value("hash index needs at least one bucket"));
        }
        let entry_size = entry_size::<K, V>()?;
        let slots_per_block = block_capacity(entry_size);

        let header_page = bpm.new_page()?;
        let header_page_id = header_page.read()?.id;

        let mut header = HeaderPage::default();
        for _ in 0..num_buckets {
            let block_page = bpm.new_page()?;
            let block_page_id = block_page.read()?.id;
            header.block_page_ids.push(block_page_id);
            // a zeroed block page is already a valid empty block
            bpm.unpin_page(block_page_id, false);
        }

        let mut guard = header_page.write()?;
        header.encode(&mut guard.data)?;
        drop(guard);
        bpm.unpin_page(header_page_id, true);

        Ok(LinearHashTable {
            bpm,
            hash_fn,
            header_page_id,
            slots_per_block,
            entry_size,
            _marker: PhantomData,
        })
    }

    /// Open an existing index rooted at header_page_id.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        header_page_id: PageId,
        hash_fn: Box<dyn HashFn<K>>,
    ) -> Result<Self> {
        let entry_size = entry_size::<K, V>()?;
        let slots_per_block = block_capacity(entry_size);
        Ok(LinearHashTable {
            bpm,
            hash_fn,
            header_page_id,
            slots_per_block,
            entry_size,
            _marker: PhantomData,
        })
    }

    /// The page id of the header page, the root of the index on disk.
    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Number of buckets.
    pub fn get_size(&self) -> Result<usize> {
        Ok(self.header()?.num_blocks())
    }

    /// Collect every value stored under the key. An empty vector means the
    /// key is not present.
    pub fn get(&self, key: &K) -> Result<Vec<V>> {
        let block_page_id = self.block_page_id_for(key)?;
        let page = self.bpm.fetch_page(block_page_id)?;
        let mut guard = page.write()?;
        let block: BlockPage<K, V> =
            BlockPage::new(&mut guard.data, self.slots_per_block, self.entry_size);

        let mut values = Vec::new();
        for i in 0..block.num_slots() {
            if !block.is_occupied(i) {
                // end of the probe chain
                break;
            }
            if !block.is_readable(i) {
                // tombstone
                continue;
            }
            let (k, v) = block.entry_at(i)?;
            if k == *key {
                values.push(v);
            }
        }

        drop(guard);
        self.bpm.unpin_page(block_page_id, false);
        Ok(values)
    }

    /// Insert a (key, value) pair. Returns false if the exact pair is
    /// already present or the bucket's block page is full.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        let block_page_id = self.block_page_id_for(key)?;
        let page = self.bpm.fetch_page(block_page_id)?;
        let mut guard = page.write()?;
        let mut block: BlockPage<K, V> =
            BlockPage::new(&mut guard.data, self.slots_per_block, self.entry_size);

        // duplicate (key, value) pairs are forbidden
        for i in 0..block.num_slots() {
            if !block.is_occupied(i) {
                break;
            }
            if !block.is_readable(i) {
                continue;
            }
            let (k, v) = block.entry_at(i)?;
            if k == *key && v == *value {
                drop(guard);
                self.bpm.unpin_page(block_page_id, false);
                return Ok(false);
            }
        }

        // the first non-readable slot wins; tombstones are reclaimed here
        let mut inserted = false;
        for i in 0..block.num_slots() {
            if !block.is_readable(i) {
                block.insert(i, key, value)?;
                inserted = true;
                break;
            }
        }

        drop(guard);
        self.bpm.unpin_page(block_page_id, inserted);
        Ok(inserted)
    }

    /// Remove the (key, value) pair, leaving a tombstone in its slot.
    /// Returns false if the pair is not present.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool> {
        let block_page_id = self.block_page_id_for(key)?;
        let page = self.bpm.fetch_page(block_page_id)?;
        let mut guard = page.write()?;
        let mut block: BlockPage<K, V> =
            BlockPage::new(&mut guard.data, self.slots_per_block, self.entry_size);

        let mut removed = false;
        for i in 0..block.num_slots() {
            if !block.is_occupied(i) {
                break;
            }
            if !block.is_readable(i) {
                continue;
            }
            let (k, v) = block.entry_at(i)?;
            if k == *key && v == *value {
                block.remove(i);
                removed = true;
                break;
            }
        }

        drop(guard);
        self.bpm.unpin_page(block_page_id, removed);
        Ok(removed)
    }

    /// Rehash the index into a new bucket count.
    pub fn resize(&mut self, _num_buckets: usize) -> Result<()> {
        todo!()
    }

    fn header(&self) -> Result<HeaderPage> {
        let page = self.bpm.fetch_page(self.header_page_id)?;
        let guard = page.read()?;
        let header = HeaderPage::decode(&guard.data)?;
        drop(guard);
        self.bpm.unpin_page(self.header_page_id, false);
        Ok(header)
    }

    fn block_page_id_for(&self, key: &K) -> Result<PageId> {
        let header = self.header()?;
        let bucket = (self.hash_fn.hash_key(key) % header.num_blocks() as u64) as usize;
        Ok(header.block_page_ids[bucket])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::prelude::*;

    use super::*;
    use crate::index::StdHashFn;
    use crate::storage::memory::MemoryDisk;
    use crate::storage::{disk::FileDisk, DiskManager};

    /// Routes an i64 key to bucket key % n, for deterministic placement.
    struct IdentityHash;

    impl HashFn<i64> for IdentityHash {
        fn hash_key(&self, key: &i64) -> u64 {
            *key as u64
        }
    }

    fn new_bpm(pool_size: usize) -> Arc<BufferPoolManager> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        Arc::new(BufferPoolManager::new(disk, pool_size))
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let bpm = new_bpm(8);
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::new(Arc::clone(&bpm), 4, Box::new(IdentityHash))?;
        assert_eq!(4, index.get_size()?);

        // Scenario: 5 and 9 both land in bucket 1, in different slots.
        assert!(index.insert(&5, &50)?);
        assert!(index.insert(&9, &90)?);
        assert_eq!(vec![50], index.get(&5)?);
        assert_eq!(vec![90], index.get(&9)?);

        // Scenario: a missing key yields an empty result, not an error.
        assert!(index.get(&13)?.is_empty());

        // Scenario: duplicate (key, value) pairs are rejected.
        assert!(!index.insert(&5, &50)?);

        // Scenario: the same key may hold several distinct values.
        assert!(index.insert(&5, &51)?);
        assert_eq!(vec![50, 51], index.get(&5)?);

        Ok(())
    }

    #[test]
    fn test_remove_and_tombstone_reuse() -> Result<()> {
        let bpm = new_bpm(8);
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::new(Arc::clone(&bpm), 4, Box::new(IdentityHash))?;

        assert!(index.insert(&5, &50)?);
        assert!(index.insert(&9, &90)?);

        // Scenario: removing (5, 50) leaves a tombstone, so 9 in a later
        // slot of the same bucket stays reachable.
        assert!(index.remove(&5, &50)?);
        assert!(index.get(&5)?.is_empty());
        assert_eq!(vec![90], index.get(&9)?);

        // Scenario: removing a pair that is not present fails.
        assert!(!index.remove(&5, &50)?);
        assert!(!index.remove(&77, &7)?);

        // Scenario: a new insert reuses the tombstoned slot.
        assert!(index.insert(&5, &51)?);
        assert_eq!(vec![51], index.get(&5)?);
        assert_eq!(vec![90], index.get(&9)?);

        Ok(())
    }

    #[test]
    fn test_bucket_full() -> Result<()> {
        let bpm = new_bpm(4);
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::new(Arc::clone(&bpm), 1, Box::new(IdentityHash))?;

        // Scenario: a single bucket takes exactly one block page worth of
        // entries, then rejects further inserts.
        let slots = block_capacity(entry_size::<i64, i64>()?) as i64;
        for i in 0..slots {
            assert!(index.insert(&i, &i)?);
        }
        assert!(!index.insert(&slots, &slots)?);

        // Scenario: removing one entry makes room for one insert again.
        assert!(index.remove(&3, &3)?);
        assert!(index.insert(&slots, &slots)?);
        assert!(!index.insert(&(slots + 1), &(slots + 1))?);

        Ok(())
    }

    #[test]
    fn test_random_against_reference() -> Result<()> {
        // a small pool forces steady eviction traffic underneath the index
        let bpm = new_bpm(4);
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::new(Arc::clone(&bpm), 8, Box::new(StdHashFn))?;

        let mut rng = StdRng::seed_from_u64(0xf3a7);
        let mut reference: HashMap<i64, Vec<i64>> = HashMap::new();
        for _ in 0..500 {
            let key = rng.gen_range(0..100);
            let value = rng.gen_range(0..1000);
            let expect = !reference.get(&key).map_or(false, |vs| vs.contains(&value));
            assert_eq!(expect, index.insert(&key, &value)?);
            if expect {
                reference.entry(key).or_default().push(value);
            }
        }

        // remove roughly half of what was inserted
        for key in 0..100 {
            if key % 2 != 0 {
                continue;
            }
            if let Some(values) = reference.get_mut(&key) {
                while values.len() > 1 {
                    let value = values.pop().unwrap();
                    assert!(index.remove(&key, &value)?);
                }
            }
        }

        for key in 0..100 {
            let mut got = index.get(&key)?;
            let mut expect = reference.get(&key).cloned().unwrap_or_default();
            got.sort();
            expect.sort();
            assert_eq!(expect, got, "key {}", key);
        }

        Ok(())
    }

    #[test]
    fn test_survives_flush_and_reopen() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("pages");

        let disk: Arc<dyn DiskManager> = Arc::new(FileDisk::new(&path)?);
        let bpm = Arc::new(BufferPoolManager::new(disk, 8));
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::new(Arc::clone(&bpm), 4, Box::new(IdentityHash))?;
        let root = index.header_page_id();

        assert!(index.insert(&5, &50)?);
        assert!(index.insert(&6, &60)?);
        bpm.flush_all_pages()?;
        drop(index);
        drop(bpm);

        // Scenario: a fresh pool over the same page file sees the index.
        let disk: Arc<dyn DiskManager> = Arc::new(FileDisk::new(&path)?);
        let bpm = Arc::new(BufferPoolManager::new(disk, 8));
        let index: LinearHashTable<i64, i64> =
            LinearHashTable::open(Arc::clone(&bpm), root, Box::new(IdentityHash))?;
        assert_eq!(4, index.get_size()?);
        assert_eq!(vec![50], index.get(&5)?);
        assert_eq!(vec![60], index.get(&6)?);
        assert!(!index.insert(&5, &50)?);

        Ok(())
    }
}
