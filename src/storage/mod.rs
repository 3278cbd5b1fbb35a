use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::storage::page::PageId;

pub mod buffer;
pub mod disk;
pub mod memory;
pub mod page;

/// A disk manager moving fixed-size pages between main memory and the
/// backing store, and handing out page ids.
///
/// Methods take `&self`: implementations guard their state with an interior
/// mutex, so a single manager can be shared behind an `Arc` by the buffer
/// pool and its clients.
pub trait DiskManager: Send + Sync {
    /// Read one page into `buf`, which must be PAGE_SIZE bytes. Pages that
    /// were never written read back as all zeroes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persist one page-sized buffer under the given page id.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Hand out a fresh page id. Ids increase monotonically and are never
    /// reissued within the lifetime of the manager.
    fn allocate_page(&self) -> Result<PageId>;

    /// Release a page id previously handed out by allocate_page.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

#[derive(Debug, PartialEq, Deserialize)]
pub enum DiskType {
    Memory,
    File,
}

pub fn new_disk(typ: DiskType, path: &Path) -> Result<Arc<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Arc::new(memory::MemoryDisk::new())),
        DiskType::File => Ok(Arc::new(disk::FileDisk::new(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;

    #[test]
    fn test_new_disk() -> Result<()> {
        let dir = tempfile::TempDir::new()?;

        let memory = new_disk(DiskType::Memory, dir.path())?;
        assert_eq!(0, memory.allocate_page()?);

        let file = new_disk(DiskType::File, &dir.path().join("pages"))?;
        let mut buf = vec![0; PAGE_SIZE];
        file.read_page(file.allocate_page()?, &mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }
}
