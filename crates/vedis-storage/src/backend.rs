//! Byte-addressed stores the pager reads pages from and writes pages to.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use vedis_core::{Error, Result};

/// Random-access byte store underneath the pager.
///
/// Implementations only move bytes; page layout, caching and journaling are
/// the pager's business.
pub trait PageStore: Send {
    /// Read exactly `len` bytes at `offset`.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `data` at `offset`, growing the store if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Current size in bytes.
    fn size(&self) -> Result<u64>;

    /// Set the size to exactly `new_size` bytes.
    fn truncate(&mut self, new_size: u64) -> Result<()>;

    /// Make every completed write durable.
    fn sync(&mut self) -> Result<()>;

    /// True if the contents survive the process.
    fn is_persistent(&self) -> bool;
}

/// File-backed store holding an advisory lock for its whole lifetime.
///
/// Writable stores take an exclusive lock, read-only stores a shared one.
/// A lock held elsewhere fails the open with [`Error::Busy`]; there is no
/// retry.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileStore {
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = if read_only {
            OpenOptions::new().read(true).open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?
        };

        let locked = if read_only {
            FileExt::try_lock_shared(&file)
        } else {
            FileExt::try_lock_exclusive(&file)
        };
        if locked.is_err() {
            tracing::debug!(path = %path.display(), "Database file is locked by another handle");
            return Err(Error::Busy);
        }

        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageStore for FileStore {
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if end > self.size {
            return Err(Error::Corrupted(format!(
                "read of {} bytes at offset {} past end of file ({} bytes)",
                len, offset, self.size
            )));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.size = self.size.max(offset + data.len() as u64);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.file.set_len(new_size)?;
        self.size = new_size;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// In-memory store for `:mem:` databases.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageStore for MemoryStore {
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        let end = start.saturating_add(len);
        self.data
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "read of {} bytes at offset {} past end of memory store ({} bytes)",
                    len,
                    offset,
                    self.data.len()
                ))
            })
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if self.data.len() < end {
            self.data
                .try_reserve(end - self.data.len())
                .map_err(|_| Error::OutOfMemory)?;
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.data.resize(new_size as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
