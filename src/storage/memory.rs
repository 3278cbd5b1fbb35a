use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::page::{PageId, PAGE_SIZE};
use crate::storage::DiskManager;

/// An in-memory disk manager, mainly for testing and ephemeral databases.
pub struct MemoryDisk {
    inner: Mutex<Inner>,
}

struct Inner {
    pages: HashMap<PageId, Vec<u8>>,
    next_page_id: PageId,
}

impl MemoryDisk {
    pub fn new() -> MemoryDisk {
        MemoryDisk { inner: Mutex::new(Inner { pages: HashMap::new(), next_page_id: 0 }) }
    }
}

impl Default for MemoryDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDisk {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        check_page_size(buf)?;
        let inner = self.inner.lock()?;
        match inner.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_size(data)?;
        let mut inner = self.inner.lock()?;
        inner.pages.insert(page_id, data.to_vec());
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock()?;
        let page_id = inner.next_page_id;
        inner.next_page_id += 1;
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.pages.remove(&page_id);
        Ok(())
    }
}

pub(super) fn check_page_size(buf: &[u8]) -> Result<()> {
    if buf.len() != PAGE_SIZE {
        return Err(Error::value(format!(
            "page buffer of {} bytes, expect {}",
            buf.len(),
            PAGE_SIZE
        )));
    }
    Ok(())
}
