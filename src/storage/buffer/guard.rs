use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::types::{Page, PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::manager::BufferPoolManager;

/// Owned shared latch on a page payload
pub type PageReadLatch = ArcRwLockReadGuard<RawRwLock, Page>;
/// Owned exclusive latch on a page payload
pub type PageWriteLatch = ArcRwLockWriteGuard<RawRwLock, Page>;

/// Scoped ownership of one pin on a buffer pool page.
///
/// Dropping the guard releases the pin, passing along the dirty flag the
/// holder accumulated. Ownership moves with the value; a moved-from guard
/// no longer exists, so the pin is released exactly once.
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    page: PagePtr,
    page_id: PageId,
    is_dirty: bool,
}

impl PageGuard {
    fn new(bpm: Arc<BufferPoolManager>, page: PagePtr, page_id: PageId) -> Self {
        Self {
            bpm,
            page,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The underlying page handle. Callers that touch the payload through
    /// it must take the page latch themselves.
    pub fn page(&self) -> &PagePtr {
        &self.page
    }

    /// Record that the holder mutated the payload; the pin will be
    /// released with the dirty flag set.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        // The drop path is total: a stale or double unpin answers false
        // and is deliberately ignored here.
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// A pin plus a shared latch on the page payload.
///
/// Field order matters: the latch is declared first so it is released
/// before the pin when the guard drops.
pub struct ReadPageGuard {
    latch: PageReadLatch,
    guard: PageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.data
    }
}

/// A pin plus the exclusive latch on the page payload.
///
/// Field order matters: the latch is declared first so it is released
/// before the pin when the guard drops.
pub struct WritePageGuard {
    latch: PageWriteLatch,
    guard: PageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.data
    }

    /// Mutable payload access; marks the pin dirty so the page is written
    /// back before its frame is reused.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.mark_dirty();
        &mut self.latch.data
    }
}

impl BufferPoolManager {
    /// Fetch a page wrapped in a pin-owning guard. The holder latches the
    /// payload manually as needed.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Result<PageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        Ok(PageGuard::new(Arc::clone(self), page, page_id))
    }

    /// Fetch a page and take the shared latch on its payload. The latch is
    /// acquired after the pin, outside of the pool latch.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Result<ReadPageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        let latch = page.read_arc();
        Ok(ReadPageGuard {
            latch,
            guard: PageGuard::new(Arc::clone(self), page, page_id),
        })
    }

    /// Fetch a page and take the exclusive latch on its payload.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Result<WritePageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        let latch = page.write_arc();
        Ok(WritePageGuard {
            latch,
            guard: PageGuard::new(Arc::clone(self), page, page_id),
        })
    }

    /// Create a new page wrapped in a pin-owning guard.
    pub fn new_page_guarded(self: &Arc<Self>) -> Result<(PageGuard, PageId), BufferPoolError> {
        let (page, page_id) = self.new_page()?;
        Ok((PageGuard::new(Arc::clone(self), page, page_id), page_id))
    }
}
