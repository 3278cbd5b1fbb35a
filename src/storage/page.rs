use std::ops::Deref;
use std::sync::RwLock;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel id for a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = -1;

/// On-disk page identifier. The page file is a contiguous array of
/// fixed-size pages addressed by page id.
pub type PageId = i64;

/// Index of a frame in the buffer pool, in range [0, pool_size).
pub type FrameId = usize;

/// The actual page data together with the in-memory metadata the buffer
/// pool tracks for it: the id of the page the frame currently holds, the
/// dirty bit and the pin count.
pub struct PageData {
    pub id: PageId,
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl PageData {
    fn new() -> Self {
        Self { id: INVALID_PAGE_ID, data: vec![0; PAGE_SIZE], is_dirty: false, pin_count: 0 }
    }

    /// Reset the frame to its uninitialized state: invalid id, zeroed
    /// buffer, no pins, clean.
    pub fn reset(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page acts as the container of the actual page data for providing
/// concurrent access protection.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page in memory with PAGE_SIZE zeroed bytes and the
    /// metadata initialized accordingly.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[test]
    fn test_reset() -> Result<()> {
        let page = Page::new();
        let mut guard = page.write()?;
        guard.id = 7;
        guard.pin_count = 2;
        guard.is_dirty = true;
        guard.data[0] = 0xff;

        guard.reset();
        assert_eq!(INVALID_PAGE_ID, guard.id);
        assert_eq!(0, guard.pin_count);
        assert!(!guard.is_dirty);
        assert_eq!(PAGE_SIZE, guard.data.len());
        assert!(guard.data.iter().all(|&b| b == 0));

        Ok(())
    }
}
