use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::page::{PageId, PAGE_SIZE};

/// Metadata page of a hash index: the ordered list of block page ids, one
/// per bucket. The bucket count is the length of the list.
///
/// The header is bincode-encoded at offset zero of its page.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderPage {
    pub block_page_ids: Vec<PageId>,
}

impl HeaderPage {
    pub fn decode(data: &[u8]) -> Result<HeaderPage> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn encode(&self, data: &mut [u8]) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        if bytes.len() > data.len() {
            return Err(Error::value(format!(
                "hash index header with {} buckets does not fit in one page",
                self.block_page_ids.len()
            )));
        }
        data[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    pub fn num_blocks(&self) -> usize {
        self.block_page_ids.len()
    }
}

/// Fixed encoded size of one (key, value) slot. Keys and values encode at
/// a constant width under bincode's fixed-int encoding, which the slot
/// array layout depends on.
pub fn entry_size<K, V>() -> Result<usize>
where
    K: Serialize + Default,
    V: Serialize + Default,
{
    let size = bincode::serialized_size(&(K::default(), V::default()))?;
    Ok(usize::try_from(size)?)
}

/// Largest slot count such that two bitmaps of ceil(slots/8) bytes plus
/// the fixed-size slot array fit in one page.
pub fn block_capacity(entry_size: usize) -> usize {
    let mut slots = (PAGE_SIZE * 8) / (entry_size * 8 + 2);
    while 2 * slots.div_ceil(8) + slots * entry_size > PAGE_SIZE {
        slots -= 1;
    }
    slots
}

/// A view over the byte buffer of one hash block page:
///
/// [occupied bitmap][readable bitmap][slot 0][slot 1]...
///
/// occupied records that a slot has ever held an entry, readable that it
/// currently holds a live one. A slot with occupied set and readable clear
/// is a tombstone: probing continues past it and insertion may reuse it.
/// An all-zero page is a valid empty block.
pub struct BlockPage<'a, K, V> {
    data: &'a mut [u8],
    slots: usize,
    entry_size: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V> BlockPage<'a, K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn new(data: &'a mut [u8], slots: usize, entry_size: usize) -> BlockPage<'a, K, V> {
        BlockPage { data, slots, entry_size, _marker: PhantomData }
    }

    pub fn num_slots(&self) -> usize {
        self.slots
    }

    pub fn is_occupied(&self, i: usize) -> bool {
        self.bit(0, i)
    }

    pub fn is_readable(&self, i: usize) -> bool {
        self.bit(self.bitmap_len(), i)
    }

    /// The key stored at slot i. Only meaningful while is_readable(i).
    pub fn key_at(&self, i: usize) -> Result<K> {
        Ok(self.entry_at(i)?.0)
    }

    /// The value stored at slot i. Only meaningful while is_readable(i).
    pub fn value_at(&self, i: usize) -> Result<V> {
        Ok(self.entry_at(i)?.1)
    }

    pub fn entry_at(&self, i: usize) -> Result<(K, V)> {
        let off = self.slot_offset(i);
        Ok(bincode::deserialize(&self.data[off..off + self.entry_size])?)
    }

    /// Store an entry at slot i, marking it occupied and readable. Returns
    /// false if the slot currently holds a live entry.
    pub fn insert(&mut self, i: usize, key: &K, value: &V) -> Result<bool> {
        if self.is_readable(i) {
            return Ok(false);
        }
        let off = self.slot_offset(i);
        bincode::serialize_into(&mut self.data[off..off + self.entry_size], &(key, value))?;
        self.set_bit(0, i);
        self.set_bit(self.bitmap_len(), i);
        Ok(true)
    }

    /// Clear readable at slot i, leaving occupied set as a tombstone.
    pub fn remove(&mut self, i: usize) {
        let base = self.bitmap_len();
        self.data[base + i / 8] &= !(1 << (i % 8));
    }

    fn bitmap_len(&self) -> usize {
        self.slots.div_ceil(8)
    }

    fn slot_offset(&self, i: usize) -> usize {
        2 * self.bitmap_len() + i * self.entry_size
    }

    fn bit(&self, base: usize, i: usize) -> bool {
        self.data[base + i / 8] & (1 << (i % 8)) != 0
    }

    fn set_bit(&mut self, base: usize, i: usize) {
        self.data[base + i / 8] |= 1 << (i % 8);
    }
}
