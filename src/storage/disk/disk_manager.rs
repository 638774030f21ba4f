use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager is responsible for the actual disk I/O: blocking positioned
/// reads and writes of fixed-size pages against a single database file.
pub struct DiskManager {
    db_file: Mutex<File>,
    read_count: AtomicU64,
    write_count: AtomicU64,
}

impl DiskManager {
    /// Create a new DiskManager backed by the specified database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        Ok(Self {
            db_file: Mutex::new(file),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        })
    }

    /// Read a page from disk into `buf`. A page that has never been written
    /// lies past the end of the file and reads back as all zeroes.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<(), DiskManagerError> {
        if page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }
        let offset = Self::page_offset(page_id);

        let mut file = self.db_file.lock();
        let file_size = file.metadata()?.len();

        if offset >= file_size {
            buf.fill(0);
            self.read_count.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let available = (file_size - offset).min(PAGE_SIZE as u64) as usize;
        file.read_exact(&mut buf[..available])?;
        if available < PAGE_SIZE {
            // Trailing partial page, e.g. after an external truncation.
            log::warn!("short read of page {}: {} of {} bytes", page_id, available, PAGE_SIZE);
            buf[available..].fill(0);
        }

        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Write a page to disk, flushing the file afterwards; blocking.
    pub fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<(), DiskManagerError> {
        if page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }
        let offset = Self::page_offset(page_id);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;

        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of page reads issued so far
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Number of page writes issued so far
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Byte offset of a page in the file
    fn page_offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}
