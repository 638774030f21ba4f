use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::common::types::{FrameId, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruKReplacer;
use crate::storage::disk::DiskManager;

/// Frame slot metadata; only ever read or written under the pool latch.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl FrameMeta {
    fn empty() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }

    fn reset(&mut self) {
        *self = Self::empty();
    }
}

/// Pool state guarded by the single coarse latch. Every public operation
/// holds this lock for its full duration, disk I/O on the eviction and
/// flush paths included, so each state transition is observed atomically.
struct PoolState {
    metas: Vec<FrameMeta>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruKReplacer,
    next_page_id: PageId,
}

impl PoolState {
    fn allocate_page_id(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }
}

/// BufferPoolManager caches a fixed number of fixed-size pages in memory,
/// reading them from and writing them back to disk through a DiskManager.
///
/// Pages are handed out pinned; a page becomes an eviction candidate only
/// once every pin has been released. Eviction is delegated to an LRU-K
/// replacer. Dirty pages are written through on eviction, flush, and
/// delete.
pub struct BufferPoolManager {
    pool_size: usize,
    /// Page payloads. The RwLock on each entry is the page latch; it is
    /// acquired outside of the pool latch by guard holders.
    frames: Vec<PagePtr>,
    state: Mutex<PoolState>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        replacer_k: usize,
        db_path: impl AsRef<Path>,
    ) -> Result<Self, BufferPoolError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let mut frames = Vec::with_capacity(pool_size);
        let mut metas = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        // Initially, every frame is on the free list.
        for frame_id in 0..pool_size {
            frames.push(Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))));
            metas.push(FrameMeta::empty());
            free_list.push_back(frame_id);
        }

        Ok(Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                metas,
                page_table: HashMap::new(),
                free_list,
                replacer: LruKReplacer::new(pool_size, replacer_k),
                next_page_id: 0,
            }),
            disk_manager,
        })
    }

    /// Create a brand-new zeroed page, pinned into a frame.
    /// Fails with `Full` when every frame is pinned.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = self.obtain_frame(&mut state)?;
        let page_id = state.allocate_page_id();

        {
            let mut page = self.frames[frame_id].write();
            page.page_id = page_id;
            page.data.fill(0);
        }

        let meta = &mut state.metas[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;

        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id)?;
        state.replacer.set_evictable(frame_id, false)?;

        Ok((Arc::clone(&self.frames[frame_id]), page_id))
    }

    /// Fetch a page, reading it from disk on a miss. The returned page is
    /// pinned; callers must balance every successful fetch with an unpin.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidPageId(page_id));
        }
        let mut state = self.state.lock();

        // Resident: one more pin, one more recorded access.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.metas[frame_id].pin_count += 1;
            state.replacer.record_access(frame_id)?;
            state.replacer.set_evictable(frame_id, false)?;
            return Ok(Arc::clone(&self.frames[frame_id]));
        }

        let frame_id = self.obtain_frame(&mut state)?;
        {
            let mut page = self.frames[frame_id].write();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut page.data) {
                // Put the frame back in circulation before surfacing the error.
                drop(page);
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
            page.page_id = page_id;
        }

        let meta = &mut state.metas[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;

        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id)?;
        state.replacer.set_evictable(frame_id, false)?;

        Ok(Arc::clone(&self.frames[frame_id]))
    }

    /// Release one pin on a page. Returns false when the page is not
    /// resident or its pin count is already zero.
    ///
    /// The dirty flag is sticky: a true from any unpinner keeps the page
    /// dirty until a flush or delete clears it; false never clears it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let meta = &mut state.metas[frame_id];
        if meta.pin_count == 0 {
            return false;
        }
        if is_dirty {
            meta.is_dirty = true;
        }
        meta.pin_count -= 1;

        if meta.pin_count == 0 {
            // Every resident frame has a replacer node, recorded at pin time.
            let _ = state.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Write a page through to disk if it is dirty, clearing the dirty bit.
    /// Returns Ok(false) when the page is not resident; a clean page emits
    /// no disk write, so flushing twice is idempotent.
    ///
    /// Blocks while another thread holds the page's write latch. A thread
    /// must not flush a page whose write guard it still holds.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };

        if state.metas[frame_id].is_dirty {
            {
                let page = self.frames[frame_id].read();
                self.disk_manager.write_page(page_id, &page.data)?;
            }
            state.metas[frame_id].is_dirty = false;
        }
        Ok(true)
    }

    /// Flush every resident dirty page under a single critical section.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        let resident: Vec<(PageId, FrameId)> =
            state.page_table.iter().map(|(&p, &f)| (p, f)).collect();

        for (page_id, frame_id) in resident {
            if state.metas[frame_id].is_dirty {
                {
                    let page = self.frames[frame_id].read();
                    self.disk_manager.write_page(page_id, &page.data)?;
                }
                state.metas[frame_id].is_dirty = false;
            }
        }
        log::debug!("flushed all resident dirty pages");
        Ok(())
    }

    /// Drop a page from the pool and deallocate its id. Returns Ok(true)
    /// when the page was removed or was not resident to begin with, and
    /// Ok(false) when it is pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            self.deallocate_page(page_id);
            return Ok(true);
        };

        if state.metas[frame_id].pin_count > 0 {
            return Ok(false);
        }

        state.replacer.remove(frame_id)?;
        if state.metas[frame_id].is_dirty {
            let page = self.frames[frame_id].read();
            self.disk_manager.write_page(page_id, &page.data)?;
        }

        self.frames[frame_id].write().reset();
        state.metas[frame_id].reset();
        state.page_table.remove(&page_id);
        state.free_list.push_back(frame_id);
        self.deallocate_page(page_id);

        log::trace!("deleted page {} from frame {}", page_id, frame_id);
        Ok(true)
    }

    /// Number of frames in the pool
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames currently holding no page
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of pages currently mapped by the page table
    pub fn resident_page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Pin count of a resident page; None when the page is not resident
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(state.metas[frame_id].pin_count)
    }

    /// Dirty bit of a resident page; None when the page is not resident
    pub fn is_page_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(state.metas[frame_id].is_dirty)
    }

    /// Shared handle to the disk manager
    pub fn disk_manager(&self) -> Arc<DiskManager> {
        Arc::clone(&self.disk_manager)
    }

    /// Draw a usable frame: free list first, then an eviction victim. A
    /// dirty victim is written through to disk before the frame is reused.
    fn obtain_frame(&self, state: &mut PoolState) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(BufferPoolError::Full)?;
        let victim_id = state.metas[frame_id].page_id;
        let dirty = state.metas[frame_id].is_dirty;
        debug_assert_eq!(state.metas[frame_id].pin_count, 0);

        if dirty {
            log::trace!("evicting dirty page {} from frame {}", victim_id, frame_id);
            let page = self.frames[frame_id].read();
            if let Err(e) = self.disk_manager.write_page(victim_id, &page.data) {
                // The victim's replacer node is already gone; return the
                // frame to the free list so it is not stranded.
                drop(page);
                state.page_table.remove(&victim_id);
                state.metas[frame_id].reset();
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }

        if victim_id != INVALID_PAGE_ID {
            state.page_table.remove(&victim_id);
        }
        state.metas[frame_id].reset();
        Ok(frame_id)
    }

    /// Return a page id to the allocator. Ids are never reused without a
    /// free-page map, so this is a bookkeeping no-op.
    fn deallocate_page(&self, _page_id: PageId) {}
}
