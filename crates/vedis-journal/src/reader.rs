// Journal reader - reads framed records back from the journal file
//
// A journal can legitimately end mid-record: the process may have died
// while it was being written. Such a tail is reported as end-of-journal,
// never as an error; the recovery manager then notices the missing seal.

use crate::record::{JournalRecord, MAX_RECORD_LEN};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use vedis_core::{Error, Result};

/// Sequential reader over one journal file
pub struct JournalReader {
    reader: Option<BufReader<File>>,
    offset: u64,
    truncated: bool,
}

impl JournalReader {
    /// Open the journal at `path`. A missing file reads as empty.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            reader,
            offset: 0,
            truncated: false,
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at end of file and after a torn or corrupted tail.
    pub fn next_record(&mut self) -> Result<Option<JournalRecord>> {
        let reader = match &mut self.reader {
            Some(r) => r,
            None => return Ok(None),
        };

        match Self::read_record(reader) {
            Ok(Some((record, bytes_read))) => {
                self.offset += bytes_read as u64;
                Ok(Some(record))
            }
            Ok(None) => {
                self.reader = None;
                Ok(None)
            }
            Err(e) if Self::is_torn_tail(&e) => {
                tracing::debug!(offset = self.offset, error = %e, "Journal ends in a torn record");
                self.truncated = true;
                self.reader = None;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn read_record(reader: &mut BufReader<File>) -> Result<Option<(JournalRecord, usize)>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let content_len = u32::from_le_bytes(len_buf) as usize;
        if content_len == 0 || content_len > MAX_RECORD_LEN {
            return Err(Error::Corrupted(format!(
                "Journal record length out of range: {}",
                content_len
            )));
        }

        let mut data = vec![0u8; content_len + 4];
        reader.read_exact(&mut data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Serialization("Incomplete record: truncated".to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let mut frame = Vec::with_capacity(4 + data.len());
        frame.extend_from_slice(&len_buf);
        frame.extend_from_slice(&data);

        let (record, consumed) = JournalRecord::decode(&frame)?;
        Ok(Some((record, consumed)))
    }

    fn is_torn_tail(err: &Error) -> bool {
        matches!(err, Error::Serialization(_) | Error::Corrupted(_))
    }

    /// Bytes consumed by successfully decoded records
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True if reading stopped at a torn or corrupted record
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Read all remaining records into a vector
    pub fn read_all(&mut self) -> Result<Vec<JournalRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl Iterator for JournalReader {
    type Item = Result<JournalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
