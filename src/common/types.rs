use std::sync::Arc;
use parking_lot::RwLock;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
pub type PageId = i32;

/// Identifier of a page that is not resident anywhere
pub const INVALID_PAGE_ID: PageId = -1;

/// Buffer pool frame ID type
pub type FrameId = usize;

/// In-memory copy of one disk page. The `RwLock` wrapping a `Page` is the
/// page latch: it protects the payload, not the frame metadata, which the
/// buffer pool keeps under its own latch.
#[derive(Clone)]
pub struct Page {
    pub page_id: PageId,
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            data: [0; PAGE_SIZE],
        }
    }

    /// Return the slot to its pristine state: no identity, zeroed payload.
    pub fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.data.fill(0);
    }
}

/// Smart pointer to a page
pub type PagePtr = Arc<RwLock<Page>>;
