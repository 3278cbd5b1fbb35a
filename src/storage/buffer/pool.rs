use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{Error, Result};
use crate::storage::buffer::replacer::{Replacer, SyncClockReplacer};
use crate::storage::page::{FrameId, Page, PageId, INVALID_PAGE_ID};
use crate::storage::DiskManager;

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows the DBMS to support databases that
/// are larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts of the
/// system: the system asks for a page using its unique identifier
/// (page_id) and does not know whether that page is already in memory or
/// has to be retrieved from disk.
struct BufferPool {
    /// Array of buffer pool pages. The array index is the FrameId, i.e.
    /// the FrameId is in range [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// Page table for keeping track of resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// List of free frames that don't have any pages on them.
    free_list: VecDeque<FrameId>,
    /// Replacer to find unpinned pages for replacement.
    replacer: Arc<dyn Replacer>,
    /// The disk manager pages are read from and written to.
    disk: Arc<dyn DiskManager>,
}

/// Outcome of deleting a page from the pool, used by the manager to decide
/// whether the disk manager must deallocate the id.
enum Deletion {
    NotResident,
    Pinned,
    Deleted,
}

impl BufferPool {
    fn new(disk: Arc<dyn DiskManager>, pool_size: usize) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is on the free list
            free_list.push_back(i);
        }
        BufferPool {
            pages,
            page_table: HashMap::new(),
            free_list,
            replacer: Arc::new(SyncClockReplacer::new(pool_size)),
            disk,
        }
    }

    /// Create a new page in the buffer pool, or fail with NoAvailableFrame
    /// if all frames are currently in use and not evictable (in other
    /// words, pinned).
    ///
    /// Picks the replacement frame from either the free list or the
    /// replacer (always from the free list first), asks the disk manager
    /// for a fresh page id, writes the old occupant back if it was dirty,
    /// and resets the frame's memory and metadata for the new page. The
    /// new page starts with pin count 1 and is kept out of the replacer
    /// until the caller unpins it.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = match self.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => self.replacer.victim().ok_or(Error::NoAvailableFrame)?,
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        let page_id = self.disk.allocate_page()?;

        // write the old occupant back if it diverged from disk
        let prev_page_id = guard.id;
        if prev_page_id != INVALID_PAGE_ID && guard.is_dirty {
            debug!("evicting dirty page {} from frame {}", prev_page_id, frame_id);
            self.disk.write_page(prev_page_id, &guard.data)?;
        }
        self.page_table.remove(&prev_page_id);

        guard.reset();
        guard.id = page_id;
        guard.pin_count = 1;
        self.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page from the buffer pool, or fail with
    /// NoAvailableFrame if the page has to come from disk while all frames
    /// are currently in use and not evictable (in other words, pinned).
    ///
    /// If the page is resident it is pinned and returned immediately.
    /// Otherwise a replacement frame is picked from either the free list
    /// or the replacer (always from the free list first), the old occupant
    /// is written back if it was dirty, and the page's bytes are read from
    /// the disk manager into the frame.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        // page already resident, pin it and return immediately
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            guard.pin_count += 1;
            self.replacer.pin(frame_id);

            drop(guard);
            return Ok(page);
        }

        let frame_id = match self.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => self.replacer.victim().ok_or(Error::NoAvailableFrame)?,
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        // write the old occupant back if it diverged from disk
        let prev_page_id = guard.id;
        if prev_page_id != INVALID_PAGE_ID && guard.is_dirty {
            debug!("evicting dirty page {} from frame {}", prev_page_id, frame_id);
            self.disk.write_page(prev_page_id, &guard.data)?;
        }
        self.page_table.remove(&prev_page_id);

        guard.reset();
        guard.id = page_id;
        guard.pin_count = 1;
        self.disk.read_page(page_id, &mut guard.data)?;
        self.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        drop(guard);
        Ok(page)
    }

    /// Unpin the target page. Returns false if the page is not resident or
    /// its pin count is already 0.
    ///
    /// Dirtiness is sticky for the page's residency: the flag is OR-ed
    /// with is_dirty, so a clean unpin never clears an earlier dirty mark.
    /// When the pin count reaches 0 the frame becomes evictable.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> bool {
        let frame_id = self.page_table.get(&page_id);
        if frame_id.is_none() {
            return false;
        }
        let &frame_id = frame_id.unwrap();
        let page = &self.pages[frame_id];
        let mut guard = page.write().unwrap();
        if guard.pin_count == 0 {
            return false;
        }
        guard.pin_count -= 1;
        guard.is_dirty = guard.is_dirty || is_dirty;
        if guard.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Write the target page to disk if it is dirty and unset the dirty
    /// flag. The frame stays resident and keeps its pin count.
    ///
    /// Returns false if the page is not resident, true otherwise.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = self.page_table.get(&page_id);
        if frame_id.is_none() {
            return Ok(false);
        }
        let &frame_id = frame_id.unwrap();
        let page = &self.pages[frame_id];
        let mut guard = page.write()?;

        if guard.id != INVALID_PAGE_ID && guard.is_dirty {
            self.disk.write_page(guard.id, &guard.data)?;
        }
        guard.is_dirty = false;

        Ok(true)
    }

    /// Write every resident dirty page to disk and unset the dirty flags.
    /// Residency, pin counts and the free list are untouched.
    fn flush_all_pages(&mut self) -> Result<()> {
        for (_, &frame_id) in self.page_table.iter() {
            let page = &self.pages[frame_id];
            let mut guard = page.write()?;

            if guard.id != INVALID_PAGE_ID && guard.is_dirty {
                self.disk.write_page(guard.id, &guard.data)?;
            }
            guard.is_dirty = false;
        }
        Ok(())
    }

    /// Delete a page from the buffer pool. A page that is not resident is
    /// vacuously deleted; a pinned page cannot be deleted.
    ///
    /// On an actual delete the page leaves the page table and the
    /// replacer, and its frame goes back on the free list reset.
    fn delete_page(&mut self, page_id: PageId) -> Result<Deletion> {
        let frame_id = self.page_table.get(&page_id);
        if frame_id.is_none() {
            return Ok(Deletion::NotResident);
        }
        let &frame_id = frame_id.unwrap();
        let page = &self.pages[frame_id];
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(Deletion::Pinned);
        }
        self.page_table.remove(&page_id);
        // stop tracking the frame
        self.replacer.pin(frame_id);
        guard.reset();
        self.free_list.push_back(frame_id);

        Ok(Deletion::Deleted)
    }
}

/// Buffer pool manager wraps the buffer pool with a mutex for concurrent
/// access; all the heavy lifting happens in the buffer pool. The mutex is
/// held across disk I/O, trading throughput for straightforward
/// correctness of the pool invariants.
pub struct BufferPoolManager {
    inner: Mutex<BufferPool>,
    disk: Arc<dyn DiskManager>,
}

impl BufferPoolManager {
    pub fn new(disk: Arc<dyn DiskManager>, pool_size: usize) -> Self {
        let inner = BufferPool::new(Arc::clone(&disk), pool_size);
        BufferPoolManager { inner: Mutex::new(inner), disk }
    }

    /// Create a new page in the buffer pool, pinned for the caller. The
    /// fresh page id is read off the returned page.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.new_page()
    }

    /// Fetch the requested page with the given page id from the buffer
    /// pool, pinned for the caller.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(page_id)
    }

    /// Unpin the target page, marking it dirty if the caller modified it.
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.unpin_page(page_id, is_dirty)
    }

    /// Write the target page to disk if it is dirty and unset the dirty
    /// flag; the page stays resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Write every resident dirty page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool and deallocate its id. A page
    /// that is not resident is vacuously deleted and returns true; a
    /// pinned page returns false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let deletion = {
            let mut inner = self.inner.lock()?;
            inner.delete_page(page_id)?
        };
        // the pool lock is released before going back to the disk manager
        match deletion {
            Deletion::Pinned => Ok(false),
            Deletion::NotResident => Ok(true),
            Deletion::Deleted => {
                self.disk.deallocate_page(page_id)?;
                Ok(true)
            }
        }
    }
}
