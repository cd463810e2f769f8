// Journal record format and encoding/decoding
//
// Record format (binary):
// [length: u32 LE] [type: u8] [payload bytes] [crc32: u32 LE]
//
// Types:
// - HEADER (1): journal identity and the committed database size
// - PAGE_IMAGE (2): original content of one database page
// - SEAL (3): all images are durable; the database file may now be written

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use vedis_core::format_version::{magic, JOURNAL_FORMAT_VERSION};
use vedis_core::{Error, Result};

/// Upper bound on a single encoded record (largest page plus framing)
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Journal record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    Header = 1,
    PageImage = 2,
    Seal = 3,
}

impl TryFrom<u8> for RecordType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::Header),
            2 => Ok(RecordType::PageImage),
            3 => Ok(RecordType::Seal),
            _ => Err(Error::Corrupted(format!(
                "Unknown journal record type: {}",
                value
            ))),
        }
    }
}

/// Journal record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    Header {
        magic: u32,
        version: u16,
        page_size: u32,
        /// Page count of the database before the transaction
        page_count: u64,
        nonce: u64,
    },
    PageImage {
        page_no: u64,
        data: Vec<u8>,
    },
    Seal {
        image_count: u64,
        nonce: u64,
    },
}

/// A journal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub record_type: RecordType,
    pub payload: RecordPayload,
}

impl JournalRecord {
    /// Create a HEADER record for the current format
    pub fn header(page_size: u32, page_count: u64, nonce: u64) -> Self {
        Self {
            record_type: RecordType::Header,
            payload: RecordPayload::Header {
                magic: magic::JOURNAL,
                version: JOURNAL_FORMAT_VERSION,
                page_size,
                page_count,
                nonce,
            },
        }
    }

    /// Create a PAGE_IMAGE record
    pub fn page_image(page_no: u64, data: Vec<u8>) -> Self {
        Self {
            record_type: RecordType::PageImage,
            payload: RecordPayload::PageImage { page_no, data },
        }
    }

    /// Create a SEAL record
    pub fn seal(image_count: u64, nonce: u64) -> Self {
        Self {
            record_type: RecordType::Seal,
            payload: RecordPayload::Seal { image_count, nonce },
        }
    }

    /// Encode record to bytes with framing and CRC
    /// Format: [length: u32 LE] [type: u8] [payload bytes] [crc32: u32 LE]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload_bytes = bincode::serialize(&self.payload)
            .map_err(|e| Error::Serialization(format!("Failed to serialize payload: {}", e)))?;

        let type_byte = self.record_type as u8;
        let content_len = 1 + payload_bytes.len();

        let mut hasher = Hasher::new();
        hasher.update(&[type_byte]);
        hasher.update(&payload_bytes);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(4 + content_len + 4);
        frame.extend_from_slice(&(content_len as u32).to_le_bytes());
        frame.push(type_byte);
        frame.extend_from_slice(&payload_bytes);
        frame.extend_from_slice(&crc.to_le_bytes());

        Ok(frame)
    }

    /// Decode record from bytes with validation
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 9 {
            // Minimum: 4 (length) + 1 (type) + 0 (payload) + 4 (crc)
            return Err(Error::Serialization("Incomplete record frame".to_string()));
        }

        let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if length == 0 || length > MAX_RECORD_LEN {
            return Err(Error::Corrupted(format!(
                "Journal record length out of range: {}",
                length
            )));
        }

        let total_size = 4 + length + 4;
        if data.len() < total_size {
            return Err(Error::Serialization(format!(
                "Incomplete record: expected {} bytes, got {}",
                total_size,
                data.len()
            )));
        }

        let type_byte = data[4];
        let payload_bytes = &data[5..4 + length];

        let crc_offset = 4 + length;
        let expected_crc = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);

        let mut hasher = Hasher::new();
        hasher.update(&[type_byte]);
        hasher.update(payload_bytes);
        let actual_crc = hasher.finalize();

        if actual_crc != expected_crc {
            return Err(Error::Corrupted(format!(
                "Journal CRC mismatch: expected {}, got {}",
                expected_crc, actual_crc
            )));
        }

        let record_type = RecordType::try_from(type_byte)?;
        let payload: RecordPayload = bincode::deserialize(payload_bytes)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize payload: {}", e)))?;

        let consistent = matches!(
            (record_type, &payload),
            (RecordType::Header, RecordPayload::Header { .. })
                | (RecordType::PageImage, RecordPayload::PageImage { .. })
                | (RecordType::Seal, RecordPayload::Seal { .. })
        );
        if !consistent {
            return Err(Error::Corrupted(format!(
                "Journal record type {:?} does not match its payload",
                record_type
            )));
        }

        Ok((
            JournalRecord {
                record_type,
                payload,
            },
            total_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_conversion() {
        assert_eq!(RecordType::try_from(1).unwrap(), RecordType::Header);
        assert_eq!(RecordType::try_from(3).unwrap(), RecordType::Seal);
        assert!(RecordType::try_from(99).is_err());
    }

    #[test]
    fn test_page_image_encode_decode() {
        let record = JournalRecord::page_image(7, vec![0xAB; 512]);

        let encoded = record.encode().unwrap();
        let (decoded, size) = JournalRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(size, encoded.len());
    }

    #[test]
    fn test_header_carries_format_identity() {
        let record = JournalRecord::header(4096, 12, 99);
        let (decoded, _) = JournalRecord::decode(&record.encode().unwrap()).unwrap();
        match decoded.payload {
            RecordPayload::Header {
                magic: m,
                version,
                page_size,
                page_count,
                nonce,
            } => {
                assert_eq!(m, magic::JOURNAL);
                assert_eq!(version, JOURNAL_FORMAT_VERSION);
                assert_eq!(page_size, 4096);
                assert_eq!(page_count, 12);
                assert_eq!(nonce, 99);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_crc_validation() {
        let record = JournalRecord::page_image(1, b"original page".to_vec());
        let mut encoded = record.encode().unwrap();

        encoded[10] ^= 0xFF;

        let result = JournalRecord::decode(&encoded);
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_incomplete_record() {
        let record = JournalRecord::seal(3, 1);
        let encoded = record.encode().unwrap();

        let result = JournalRecord::decode(&encoded[..encoded.len() - 2]);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_type_payload_mismatch_rejected() {
        let mut record = JournalRecord::seal(1, 1);
        record.record_type = RecordType::PageImage;
        let encoded = record.encode().unwrap();
        assert!(matches!(
            JournalRecord::decode(&encoded),
            Err(Error::Corrupted(_))
        ));
    }
}
