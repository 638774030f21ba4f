use thiserror::Error;

use crate::common::types::PageId;
use crate::storage::buffer::replacer::ReplacerError;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Buffer pool is full: no free frame and no evictable page")]
    Full,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Replacer error: {0}")]
    Replacer(#[from] ReplacerError),

    #[error("Disk manager error: {0}")]
    DiskManager(#[from] DiskManagerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
