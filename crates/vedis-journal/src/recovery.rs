// Journal recovery - decides whether a leftover journal is "hot"
//
// A journal found next to the database on open means the previous owner
// died between starting a commit and deleting the journal. Only a sealed
// journal is hot: the seal is written and synced before the first database
// page is overwritten, so without it the database file is untouched and the
// journal is simply discarded.

use crate::record::RecordPayload;
use crate::{JournalConfig, JournalReader};
use vedis_core::format_version::{journal_version, magic};
use vedis_core::Result;

/// Original page images that must be copied back into the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotJournal {
    /// Page size the journal was written with
    pub page_size: u32,
    /// Page count of the database before the interrupted commit
    pub page_count: u64,
    /// `(page number, original bytes)` in journal order
    pub images: Vec<(u64, Vec<u8>)>,
}

/// Summary of a journal file's contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub total_records: usize,
    pub page_images: usize,
    pub sealed: bool,
    pub truncated: bool,
}

/// Reads a journal file and reconstructs what must be rolled back
pub struct RecoveryManager {
    config: JournalConfig,
}

impl RecoveryManager {
    pub fn new(config: JournalConfig) -> Self {
        Self { config }
    }

    /// Return the hot journal, or `None` when there is nothing to play back.
    pub fn recover(&self) -> Result<Option<HotJournal>> {
        let mut reader = JournalReader::open(&self.config.path)?;

        let (page_size, page_count, nonce) = match reader.next_record()? {
            Some(record) => match record.payload {
                RecordPayload::Header {
                    magic: m,
                    version,
                    page_size,
                    page_count,
                    nonce,
                } if m == magic::JOURNAL && journal_version().can_read(version) => {
                    (page_size, page_count, nonce)
                }
                _ => {
                    tracing::warn!(
                        path = %self.config.path.display(),
                        first = ?record.record_type,
                        "Journal does not start with a valid header, ignoring it"
                    );
                    return Ok(None);
                }
            },
            None => return Ok(None),
        };

        let mut images = Vec::new();
        while let Some(record) = reader.next_record()? {
            match record.payload {
                RecordPayload::PageImage { page_no, data } => {
                    if data.len() != page_size as usize {
                        tracing::warn!(
                            page_no,
                            len = data.len(),
                            page_size,
                            "Journal page image has the wrong size, ignoring journal"
                        );
                        return Ok(None);
                    }
                    images.push((page_no, data));
                }
                RecordPayload::Seal {
                    image_count,
                    nonce: seal_nonce,
                } => {
                    if seal_nonce == nonce && image_count == images.len() as u64 {
                        return Ok(Some(HotJournal {
                            page_size,
                            page_count,
                            images,
                        }));
                    }
                    tracing::warn!(
                        image_count,
                        found = images.len(),
                        "Journal seal does not match its contents, ignoring journal"
                    );
                    return Ok(None);
                }
                RecordPayload::Header { .. } => {
                    tracing::warn!("Journal contains a second header, ignoring journal");
                    return Ok(None);
                }
            }
        }

        tracing::debug!(
            images = images.len(),
            "Journal was never sealed; database file is untouched"
        );
        Ok(None)
    }

    /// Get statistics about the journal file
    pub fn get_stats(&self) -> Result<RecoveryStats> {
        let mut reader = JournalReader::open(&self.config.path)?;
        let mut stats = RecoveryStats::default();

        while let Some(record) = reader.next_record()? {
            stats.total_records += 1;
            match record.payload {
                RecordPayload::PageImage { .. } => stats.page_images += 1,
                RecordPayload::Seal { .. } => stats.sealed = true,
                RecordPayload::Header { .. } => {}
            }
        }
        stats.truncated = reader.was_truncated();

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JournalRecord, JournalWriter, SyncMode};
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, JournalConfig) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = JournalConfig::for_database(&temp_dir.path().join("recovery.db"));
        (temp_dir, config)
    }

    fn write_records(config: &JournalConfig, records: &[JournalRecord]) {
        let mut writer =
            JournalWriter::create(&config.path, SyncMode::Sync).expect("Failed to create writer");
        for record in records {
            writer.append(record).expect("Failed to append");
        }
        writer.sync().expect("Failed to sync");
    }

    #[test]
    fn test_missing_journal_is_not_hot() {
        let (_temp_dir, config) = setup_test_config();
        let recovery = RecoveryManager::new(config);
        assert_eq!(recovery.recover().expect("Failed to recover"), None);
    }

    #[test]
    fn test_sealed_journal_is_hot() {
        let (_temp_dir, config) = setup_test_config();
        write_records(
            &config,
            &[
                JournalRecord::header(256, 5, 42),
                JournalRecord::page_image(0, vec![0; 256]),
                JournalRecord::page_image(3, vec![3; 256]),
                JournalRecord::seal(2, 42),
            ],
        );

        let hot = RecoveryManager::new(config)
            .recover()
            .expect("Failed to recover")
            .expect("Journal should be hot");
        assert_eq!(hot.page_count, 5);
        assert_eq!(hot.page_size, 256);
        assert_eq!(hot.images.len(), 2);
        assert_eq!(hot.images[1], (3, vec![3; 256]));
    }

    #[test]
    fn test_unsealed_journal_is_not_hot() {
        let (_temp_dir, config) = setup_test_config();
        write_records(
            &config,
            &[
                JournalRecord::header(256, 5, 42),
                JournalRecord::page_image(0, vec![0; 256]),
            ],
        );

        let recovery = RecoveryManager::new(config);
        assert_eq!(recovery.recover().expect("Failed to recover"), None);

        let stats = recovery.get_stats().expect("Failed to get stats");
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.page_images, 1);
        assert!(!stats.sealed);
    }

    #[test]
    fn test_seal_from_other_journal_is_rejected() {
        let (_temp_dir, config) = setup_test_config();
        write_records(
            &config,
            &[
                JournalRecord::header(256, 5, 42),
                JournalRecord::page_image(0, vec![0; 256]),
                JournalRecord::seal(1, 43),
            ],
        );

        assert_eq!(
            RecoveryManager::new(config)
                .recover()
                .expect("Failed to recover"),
            None
        );
    }

    #[test]
    fn test_image_count_mismatch_is_rejected() {
        let (_temp_dir, config) = setup_test_config();
        write_records(
            &config,
            &[
                JournalRecord::header(256, 5, 42),
                JournalRecord::page_image(0, vec![0; 256]),
                JournalRecord::seal(2, 42),
            ],
        );

        assert_eq!(
            RecoveryManager::new(config)
                .recover()
                .expect("Failed to recover"),
            None
        );
    }
}
