// Page layouts
//
// Header page (page 0):
//   [magic: u32 BE "VDBF"] [version: u16] [page_size: u32] [page_count: u64]
//   [freelist_head: u64] [change_counter: u64] [crc32: u32]   (rest zero)
//
// Leaf page:
//   [type: u8 = 1] [cell_count: u16] cells...
//   cell = [flags: u8] [key_len: u16] [value_len: u32] [key] [value | first overflow page: u64]
//
// Overflow page:
//   [type: u8 = 2] [next: u64] [len: u32] [data]
//
// Free page:
//   [type: u8 = 3] [next: u64]
//
// All integers are little-endian except the magic.

use vedis_core::format_version::{database_version, magic, DATABASE_FORMAT_VERSION};
use vedis_core::{Error, Result};

/// Page size bounds; sizes must also be a power of two
pub const MIN_PAGE_SIZE: usize = 512;
pub const MAX_PAGE_SIZE: usize = 65536;
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Bytes of the header that are meaningful (including the checksum)
pub const HEADER_LEN: usize = 38;
const HEADER_CRC_OFFSET: usize = 34;

pub const LEAF_HEADER_LEN: usize = 3;
pub const CELL_HEADER_LEN: usize = 7;
pub const OVERFLOW_HEADER_LEN: usize = 13;

const CELL_FLAG_OVERFLOW: u8 = 0x01;

/// Kind of a non-header page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Leaf = 1,
    Overflow = 2,
    Free = 3,
}

impl PageType {
    pub fn of(page: &[u8]) -> Result<Self> {
        match page.first() {
            Some(1) => Ok(PageType::Leaf),
            Some(2) => Ok(PageType::Overflow),
            Some(3) => Ok(PageType::Free),
            other => Err(Error::Corrupted(format!("unknown page type {:?}", other))),
        }
    }
}

/// Largest key a cell may hold
pub fn max_key_len(page_size: usize) -> usize {
    page_size / 4
}

/// Values longer than this spill into overflow pages
pub fn max_inline_value(page_size: usize) -> usize {
    page_size / 4
}

/// Data bytes carried by one overflow page
pub fn overflow_capacity(page_size: usize) -> usize {
    page_size - OVERFLOW_HEADER_LEN
}

/// Rejects page sizes outside the supported range or not a power of two
pub fn validate_page_size(page_size: usize) -> Result<()> {
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::InvalidArgument(format!(
            "page size must be a power of two between {} and {}, got {}",
            MIN_PAGE_SIZE, MAX_PAGE_SIZE, page_size
        )));
    }
    Ok(())
}

/// Database header stored in page 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHeader {
    pub page_size: u32,
    pub page_count: u64,
    pub freelist_head: u64,
    pub change_counter: u64,
}

impl DbHeader {
    /// Header of an empty database: just page 0
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size as u32,
            page_count: 1,
            freelist_head: 0,
            change_counter: 0,
        }
    }

    /// Encode into a full page
    pub fn encode(&self) -> Vec<u8> {
        let mut page = vec![0u8; self.page_size as usize];
        page[0..4].copy_from_slice(&magic::DATABASE.to_be_bytes());
        page[4..6].copy_from_slice(&DATABASE_FORMAT_VERSION.to_le_bytes());
        page[6..10].copy_from_slice(&self.page_size.to_le_bytes());
        page[10..18].copy_from_slice(&self.page_count.to_le_bytes());
        page[18..26].copy_from_slice(&self.freelist_head.to_le_bytes());
        page[26..34].copy_from_slice(&self.change_counter.to_le_bytes());
        let crc = crc32fast::hash(&page[..HEADER_CRC_OFFSET]);
        page[HEADER_CRC_OFFSET..HEADER_LEN].copy_from_slice(&crc.to_le_bytes());
        page
    }

    /// Decode and validate the first [`HEADER_LEN`] bytes of a database file
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::Corrupted("database header is truncated".to_string()));
        }

        if data[0..4] != magic::DATABASE.to_be_bytes() {
            return Err(Error::Corrupted("not a vedis database file".to_string()));
        }

        let expected = read_u32(data, HEADER_CRC_OFFSET);
        let actual = crc32fast::hash(&data[..HEADER_CRC_OFFSET]);
        if expected != actual {
            return Err(Error::Corrupted(format!(
                "database header checksum mismatch: expected {}, got {}",
                expected, actual
            )));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if !database_version().can_read(version) {
            return Err(Error::Corrupted(format!(
                "unsupported database format version {}",
                version
            )));
        }

        let header = Self {
            page_size: read_u32(data, 6),
            page_count: read_u64(data, 10),
            freelist_head: read_u64(data, 18),
            change_counter: read_u64(data, 26),
        };
        validate_page_size(header.page_size as usize)
            .map_err(|e| Error::Corrupted(format!("bad header: {}", e)))?;
        if header.page_count == 0 || header.freelist_head >= header.page_count {
            return Err(Error::Corrupted(format!(
                "bad header: page_count {} freelist_head {}",
                header.page_count, header.freelist_head
            )));
        }
        Ok(header)
    }
}

/// Where a cell's value lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Inline(Vec<u8>),
    /// First page of an overflow chain
    Overflow(u64),
}

/// One key/value entry in a leaf page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub key: Vec<u8>,
    /// Full value length, also for overflowed values
    pub value_len: u32,
    pub value: CellValue,
}

impl Cell {
    pub fn encoded_len(&self) -> usize {
        let payload = match &self.value {
            CellValue::Inline(v) => v.len(),
            CellValue::Overflow(_) => 8,
        };
        CELL_HEADER_LEN + self.key.len() + payload
    }
}

/// Decoded leaf page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafPage {
    pub cells: Vec<Cell>,
}

impl LeafPage {
    pub fn used_bytes(&self) -> usize {
        LEAF_HEADER_LEN + self.cells.iter().map(Cell::encoded_len).sum::<usize>()
    }

    pub fn free_bytes(&self, page_size: usize) -> usize {
        page_size.saturating_sub(self.used_bytes())
    }

    pub fn position(&self, key: &[u8]) -> Option<usize> {
        self.cells.iter().position(|c| c.key == key)
    }

    pub fn encode(&self, page_size: usize) -> Result<Vec<u8>> {
        if self.used_bytes() > page_size {
            return Err(Error::Corrupted(format!(
                "leaf content of {} bytes does not fit a {} byte page",
                self.used_bytes(),
                page_size
            )));
        }

        let mut page = vec![0u8; page_size];
        page[0] = PageType::Leaf as u8;
        page[1..3].copy_from_slice(&(self.cells.len() as u16).to_le_bytes());

        let mut pos = LEAF_HEADER_LEN;
        for cell in &self.cells {
            let (flags, payload): (u8, &[u8]) = match &cell.value {
                CellValue::Inline(v) => (0, v),
                CellValue::Overflow(_) => (CELL_FLAG_OVERFLOW, &[]),
            };
            page[pos] = flags;
            page[pos + 1..pos + 3].copy_from_slice(&(cell.key.len() as u16).to_le_bytes());
            page[pos + 3..pos + 7].copy_from_slice(&cell.value_len.to_le_bytes());
            pos += CELL_HEADER_LEN;
            page[pos..pos + cell.key.len()].copy_from_slice(&cell.key);
            pos += cell.key.len();
            match &cell.value {
                CellValue::Inline(_) => {
                    page[pos..pos + payload.len()].copy_from_slice(payload);
                    pos += payload.len();
                }
                CellValue::Overflow(first) => {
                    page[pos..pos + 8].copy_from_slice(&first.to_le_bytes());
                    pos += 8;
                }
            }
        }
        Ok(page)
    }

    pub fn decode(page: &[u8]) -> Result<Self> {
        if PageType::of(page)? != PageType::Leaf {
            return Err(Error::Corrupted("expected a leaf page".to_string()));
        }
        let count_bytes = slice(page, 1, 2)?;
        let count = u16::from_le_bytes([count_bytes[0], count_bytes[1]]) as usize;

        let mut cells = Vec::with_capacity(count);
        let mut pos = LEAF_HEADER_LEN;
        for _ in 0..count {
            let header = slice(page, pos, CELL_HEADER_LEN)?;
            let flags = header[0];
            let key_len = u16::from_le_bytes([header[1], header[2]]) as usize;
            let value_len = read_u32(header, 3);
            pos += CELL_HEADER_LEN;

            let key = slice(page, pos, key_len)?.to_vec();
            pos += key_len;

            let value = if flags & CELL_FLAG_OVERFLOW != 0 {
                let first = read_u64(slice(page, pos, 8)?, 0);
                pos += 8;
                CellValue::Overflow(first)
            } else {
                let value = slice(page, pos, value_len as usize)?.to_vec();
                pos += value_len as usize;
                CellValue::Inline(value)
            };

            cells.push(Cell {
                key,
                value_len,
                value,
            });
        }
        Ok(Self { cells })
    }
}

/// Encode an overflow page carrying `data`
pub fn encode_overflow(page_size: usize, next: u64, data: &[u8]) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    page[0] = PageType::Overflow as u8;
    page[1..9].copy_from_slice(&next.to_le_bytes());
    page[9..13].copy_from_slice(&(data.len() as u32).to_le_bytes());
    page[OVERFLOW_HEADER_LEN..OVERFLOW_HEADER_LEN + data.len()].copy_from_slice(data);
    page
}

/// Decode an overflow page into `(next, data)`
pub fn decode_overflow(page: &[u8]) -> Result<(u64, &[u8])> {
    if PageType::of(page)? != PageType::Overflow {
        return Err(Error::Corrupted("expected an overflow page".to_string()));
    }
    let next = read_u64(slice(page, 1, 8)?, 0);
    let len = read_u32(slice(page, 9, 4)?, 0) as usize;
    Ok((next, slice(page, OVERFLOW_HEADER_LEN, len)?))
}

/// Free-list page pointing at `next` (0 ends the list)
pub fn encode_free(page_size: usize, next: u64) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    page[0] = PageType::Free as u8;
    page[1..9].copy_from_slice(&next.to_le_bytes());
    page
}

pub fn decode_free(page: &[u8]) -> Result<u64> {
    if PageType::of(page)? != PageType::Free {
        return Err(Error::Corrupted("expected a free page".to_string()));
    }
    Ok(read_u64(slice(page, 1, 8)?, 0))
}

fn slice(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    data.get(pos..pos + len)
        .ok_or_else(|| Error::Corrupted(format!("cell runs past end of page at {}", pos)))
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[pos..pos + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], pos: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[pos..pos + 8]);
    u64::from_le_bytes(buf)
}
