// Journal writer - appends framed records to the rollback journal file
use crate::record::JournalRecord;
use crate::SyncMode;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use vedis_core::Result;

/// Appends records to one journal file
pub struct JournalWriter {
    file: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
    records: u64,
    sync_mode: SyncMode,
}

impl JournalWriter {
    /// Create (or truncate) the journal file at `path`
    pub fn create(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            bytes_written: 0,
            records: 0,
            sync_mode,
        })
    }

    /// Append one record. Returns the number of records written so far.
    pub fn append(&mut self, record: &JournalRecord) -> Result<u64> {
        let encoded = record.encode()?;
        self.file.write_all(&encoded)?;

        self.bytes_written += encoded.len() as u64;
        self.records += 1;
        Ok(self.records)
    }

    /// Flush buffered records, then fsync unless the sync mode is `None`.
    ///
    /// The pager calls this once the seal is written and before any database
    /// page is touched.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_mode != SyncMode::None {
            self.file.get_ref().sync_all()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        // Best effort flush on drop
        let _ = self.file.flush();
    }
}
