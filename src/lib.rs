// Export public modules
pub mod common;
pub mod storage;
pub mod trie;

// Re-export key items for convenient access
pub use common::types::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
pub use storage::buffer::guard::{PageGuard, ReadPageGuard, WritePageGuard};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, LruKReplacer, ReplacerError};
pub use storage::disk::{DiskManager, DiskManagerError};
pub use trie::Trie;
