//! # Vedis Journal
//!
//! Rollback journal for the Vedis pager. Before a commit overwrites any
//! database page, the original image of that page is written to
//! `<database>-journal`, followed by a seal record, and synced. Deleting the
//! journal is the commit point. A sealed journal found on open is "hot" and
//! its images are copied back to undo the interrupted commit.
//!
//! ## Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Vedis.** Depend on
//! the `vedis` crate instead; this API may change between minor versions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vedis_core::Result;

pub mod reader;
pub mod record;
pub mod recovery;
pub mod writer;

pub use reader::JournalReader;
pub use record::{JournalRecord, RecordPayload, RecordType};
pub use recovery::{HotJournal, RecoveryManager, RecoveryStats};
pub use writer::JournalWriter;

/// Suffix appended to the database path to name its journal
pub const JOURNAL_SUFFIX: &str = "-journal";

/// Journal configuration options
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Sync mode: sync, async, or none
    pub sync_mode: SyncMode,
    /// Path of the journal file
    pub path: PathBuf,
}

impl JournalConfig {
    /// Journal configuration for the database at `db_path`
    pub fn for_database(db_path: &Path) -> Self {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(JOURNAL_SUFFIX);
        Self {
            sync_mode: SyncMode::Sync,
            path: PathBuf::from(name),
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::for_database(Path::new("vedis.db"))
    }
}

/// Sync mode for journal and database writes at commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// fsync the journal before touching the database and the database
    /// before deleting the journal (strongest durability)
    Sync,
    /// fsync the journal and the database once per commit, but not the
    /// directory entry removal
    Async,
    /// No fsync (fastest, unsafe for power loss)
    None,
}

/// Journal manager: creates, inspects and deletes the journal file
#[derive(Debug, Clone)]
pub struct Journal {
    config: JournalConfig,
}

impl Journal {
    pub fn new(config: JournalConfig) -> Self {
        Self { config }
    }

    /// Start a journal for a commit and write its header
    pub fn begin(&self, page_size: u32, page_count: u64, nonce: u64) -> Result<JournalWriter> {
        let mut writer = JournalWriter::create(&self.config.path, self.config.sync_mode)?;
        writer.append(&JournalRecord::header(page_size, page_count, nonce))?;
        tracing::trace!(path = %self.config.path.display(), nonce, "Journal started");
        Ok(writer)
    }

    /// Return the hot journal left by an interrupted commit, if any
    pub fn hot(&self) -> Result<Option<HotJournal>> {
        RecoveryManager::new(self.config.clone()).recover()
    }

    /// True if a journal file is present on disk
    pub fn exists(&self) -> bool {
        self.config.path.exists()
    }

    /// Delete the journal file. A missing journal is not an error.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.config.path) {
            Ok(()) => {
                if self.config.sync_mode == SyncMode::Sync {
                    sync_parent_dir(&self.config.path);
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Get statistics about the journal file
    pub fn stats(&self) -> Result<RecoveryStats> {
        RecoveryManager::new(self.config.clone()).get_stats()
    }

    /// Create a reader for the journal
    pub fn reader(&self) -> Result<JournalReader> {
        JournalReader::open(&self.config.path)
    }

    /// Get the current configuration
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    // Best effort: not every filesystem supports syncing a directory
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(handle) = std::fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, JournalConfig) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = JournalConfig::for_database(&temp_dir.path().join("test.db"));
        (temp_dir, config)
    }

    #[test]
    fn test_journal_config_default() {
        let config = JournalConfig::default();
        assert_eq!(config.sync_mode, SyncMode::Sync);
        assert_eq!(config.path, PathBuf::from("vedis.db-journal"));
    }

    #[test]
    fn test_journal_path_follows_database() {
        let config = JournalConfig::for_database(Path::new("/data/app.vedis"));
        assert_eq!(config.path, PathBuf::from("/data/app.vedis-journal"));
        let config = config.with_sync_mode(SyncMode::None);
        assert_eq!(config.sync_mode, SyncMode::None);
    }

    #[test]
    fn test_journal_lifecycle() {
        let (_temp_dir, config) = setup_test_config();
        let journal = Journal::new(config);
        assert!(!journal.exists());

        {
            let mut writer = journal.begin(128, 2, 5).expect("Failed to begin");
            writer
                .append(&JournalRecord::page_image(1, vec![9; 128]))
                .expect("Failed to append");
            writer
                .append(&JournalRecord::seal(1, 5))
                .expect("Failed to seal");
            writer.sync().expect("Failed to sync");
        }
        assert!(journal.exists());

        let hot = journal
            .hot()
            .expect("Failed to recover")
            .expect("Journal should be hot");
        assert_eq!(hot.images, vec![(1, vec![9; 128])]);

        let stats = journal.stats().expect("Failed to get stats");
        assert_eq!(stats.total_records, 3);
        assert!(stats.sealed);

        journal.remove().expect("Failed to remove");
        assert!(!journal.exists());
        journal.remove().expect("Removing a missing journal is not an error");
    }
}
