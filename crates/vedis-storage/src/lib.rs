//! # Vedis Storage Engine
//!
//! Page-based key/value engine for Vedis.
//!
//! ## Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Vedis.** Depend on
//! the `vedis` crate instead; this API may change between minor versions.
//!
//! ---
//!
//! Records live in cells of fixed-size leaf pages; large values spill into
//! overflow page chains and freed pages are reused through a free list. An
//! ordered in-memory index (key -> leaf page) is rebuilt from the leaves on
//! open and drives lookups and prefix scans.
//!
//! ## Architecture
//!
//! ```text
//! StorageEngine (index, transactions, undo)
//!       ↓
//! Pager (page cache, dirty pages, journaled commit)
//!       ↓                         ↓
//! PageStore (file / memory)   Journal (<db>-journal)
//! ```
//!
//! Every write runs inside a transaction: the explicit one opened by
//! [`StorageEngine::begin`], or an implicit one that the caller finishes with
//! [`StorageEngine::finish_statement`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use vedis_core::{Error, Result, TransactionKind, TransactionManager, TransactionState};
use vedis_journal::{Journal, JournalConfig, SyncMode};

pub mod backend;
pub mod page;
pub mod pager;

pub use backend::{FileStore, MemoryStore, PageStore};
pub use page::{DbHeader, PageType, DEFAULT_PAGE_SIZE};
pub use pager::Pager;

use page::{Cell, CellValue, LeafPage};

/// Default number of clean pages kept in the page cache
const DEFAULT_CACHE_PAGES: usize = 256;

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Page size for new databases; existing files keep their own
    pub page_size: usize,
    /// Clean pages kept in memory
    pub cache_pages: usize,
    /// Sync mode for the journal and database file at commit
    pub sync_mode: SyncMode,
    /// Open without write access
    pub read_only: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_pages: DEFAULT_CACHE_PAGES,
            sync_mode: SyncMode::Sync,
            read_only: false,
        }
    }
}

/// Reversible change to the in-memory index or free-space map
#[derive(Debug)]
enum Undo {
    Index { key: Vec<u8>, previous: Option<u64> },
    Space { page: u64, previous: Option<usize> },
}

/// Storage engine manager
pub struct StorageEngine {
    path: Option<PathBuf>,
    pager: Pager,
    /// key -> leaf page holding it
    index: BTreeMap<Vec<u8>, u64>,
    /// leaf page -> free bytes
    space: BTreeMap<u64, usize>,
    undo: Vec<Undo>,
    transactions: TransactionManager,
}

impl StorageEngine {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, StorageConfig::default())
    }

    /// Open or create a database file with custom configuration
    pub fn open_with_config(path: impl AsRef<Path>, config: StorageConfig) -> Result<Self> {
        let path = path.as_ref();
        let store = FileStore::open(path, config.read_only)?;
        let journal =
            Journal::new(JournalConfig::for_database(path).with_sync_mode(config.sync_mode));
        let pager = Pager::open(Box::new(store), Some(journal), &config)?;

        let engine = Self::with_pager(pager, Some(path.to_path_buf()))?;
        tracing::info!(
            path = %path.display(),
            keys = engine.index.len(),
            pages = engine.pager.page_count(),
            read_only = config.read_only,
            "Database opened"
        );
        Ok(engine)
    }

    /// Open a private in-memory database
    pub fn open_memory(config: StorageConfig) -> Result<Self> {
        let config = StorageConfig {
            read_only: false,
            ..config
        };
        let pager = Pager::open(Box::new(MemoryStore::new()), None, &config)?;
        tracing::info!("In-memory database opened");
        Self::with_pager(pager, None)
    }

    fn with_pager(mut pager: Pager, path: Option<PathBuf>) -> Result<Self> {
        let page_size = pager.page_size();
        let mut index = BTreeMap::new();
        let mut space = BTreeMap::new();

        for page_no in 1..pager.page_count() {
            let data = pager.read(page_no)?;
            if PageType::of(&data)? != PageType::Leaf {
                continue;
            }
            let leaf = LeafPage::decode(&data)?;
            for cell in &leaf.cells {
                if index.insert(cell.key.clone(), page_no).is_some() {
                    return Err(Error::Corrupted(format!(
                        "key {:?} stored twice",
                        String::from_utf8_lossy(&cell.key)
                    )));
                }
            }
            space.insert(page_no, leaf.free_bytes(page_size));
        }

        Ok(Self {
            path,
            pager,
            index,
            space,
            undo: Vec::new(),
            transactions: TransactionManager::new(),
        })
    }

    /// Retrieve a value by key
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.transactions.check_usable()?;
        let page_no = match self.index.get(key) {
            Some(page_no) => *page_no,
            None => return Ok(None),
        };

        let leaf = self.read_leaf(page_no)?;
        let cell = leaf
            .cells
            .into_iter()
            .find(|c| c.key == key)
            .ok_or_else(|| Error::Corrupted(format!("index points at page {} without key", page_no)))?;
        self.load_value(cell).map(Some)
    }

    /// Check whether a key exists
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.transactions.check_usable()?;
        Ok(self.index.contains_key(key))
    }

    /// Insert or update a key-value pair
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let value_len = u32::try_from(value.len())
            .map_err(|_| Error::InvalidArgument(format!("value of {} bytes is too large", value.len())))?;
        self.begin_write()?;

        if self.index.contains_key(key) {
            self.remove_cell(key)?;
        }

        let stored = if value.len() > page::max_inline_value(self.pager.page_size()) {
            CellValue::Overflow(self.write_overflow(value)?)
        } else {
            CellValue::Inline(value.to_vec())
        };
        self.insert_cell(Cell {
            key: key.to_vec(),
            value_len,
            value: stored,
        })
    }

    /// Append to a value, creating it if missing. Returns the new length.
    pub fn append(&mut self, key: &[u8], suffix: &[u8]) -> Result<usize> {
        let mut value = self.get(key)?.unwrap_or_default();
        value
            .try_reserve(suffix.len())
            .map_err(|_| Error::OutOfMemory)?;
        value.extend_from_slice(suffix);
        self.put(key, &value)?;
        Ok(value.len())
    }

    /// Delete a key. Returns whether it existed.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.check_writable()?;
        if !self.index.contains_key(key) {
            return Ok(false);
        }
        self.begin_write()?;
        self.remove_cell(key)?;
        Ok(true)
    }

    /// First key with `prefix` that sorts after `after` (or the first key
    /// with `prefix` when `after` is `None`)
    pub fn next_key(&self, prefix: &[u8], after: Option<&[u8]>) -> Result<Option<Vec<u8>>> {
        self.transactions.check_usable()?;
        let start = match after {
            Some(key) => Bound::Excluded(key.to_vec()),
            None => Bound::Included(prefix.to_vec()),
        };
        Ok(self
            .index
            .range((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .next()
            .cloned())
    }

    /// All keys with `prefix`, in order
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.transactions.check_usable()?;
        Ok(self
            .index
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    /// Greatest key with `prefix`
    pub fn last_key(&self, prefix: &[u8]) -> Result<Option<Vec<u8>>> {
        self.transactions.check_usable()?;
        let lower = Bound::Included(prefix);
        let last = match prefix_successor(prefix) {
            Some(upper) => self
                .index
                .range::<[u8], _>((lower, Bound::Excluded(upper.as_slice())))
                .next_back()
                .map(|(key, _)| key.clone()),
            None => self
                .index
                .range::<[u8], _>((lower, Bound::Unbounded))
                .next_back()
                .map(|(key, _)| key.clone()),
        };
        Ok(last.filter(|key| key.starts_with(prefix)))
    }

    /// All key/value pairs with `prefix`, in order
    pub fn scan(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let keys = self.keys_with_prefix(prefix)?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Open an explicit transaction
    pub fn begin(&mut self) -> Result<()> {
        let (id, fresh) = self.transactions.begin_explicit()?;
        tracing::debug!(id, promoted = !fresh, "Transaction begun");
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// A failed commit is rolled back before the error is returned; if that
    /// rollback fails too the engine enters the failed state.
    pub fn commit(&mut self) -> Result<()> {
        let id = self.transactions.commit_target()?;

        match self.pager.commit() {
            Ok(()) => {
                self.undo.clear();
                self.transactions.finish();
                tracing::debug!(id, "Transaction committed");
                Ok(())
            }
            Err(commit) => {
                tracing::warn!(id, error = %commit, "Commit failed, rolling back");
                match self.rollback_pages() {
                    Ok(()) => {
                        self.transactions.finish();
                        Err(commit)
                    }
                    Err(rollback) => {
                        tracing::warn!(id, error = %rollback, "Rollback after failed commit failed");
                        self.transactions
                            .fail(format!("rollback of transaction {} failed: {}", id, rollback));
                        Err(Error::DoubleFault {
                            commit: Box::new(commit),
                            rollback: Box::new(rollback),
                        })
                    }
                }
            }
        }
    }

    /// Roll back the open transaction. A no-op when none is open.
    pub fn rollback(&mut self) -> Result<()> {
        self.transactions.check_usable()?;
        let id = match self.transactions.active() {
            Some((id, _)) => id,
            None => {
                tracing::debug!("Rollback requested with no active transaction");
                return Ok(());
            }
        };

        match self.rollback_pages() {
            Ok(()) => {
                self.transactions.finish();
                tracing::debug!(id, "Transaction rolled back");
                Ok(())
            }
            Err(e) => {
                self.transactions
                    .fail(format!("rollback of transaction {} failed: {}", id, e));
                Err(e)
            }
        }
    }

    /// End the current statement: an implicit transaction is committed when
    /// `ok`, rolled back otherwise. Explicit transactions are left open.
    pub fn finish_statement(&mut self, ok: bool) -> Result<()> {
        self.transactions.check_usable()?;
        match self.transactions.active() {
            Some((_, TransactionKind::Implicit)) if ok => self.commit(),
            Some((_, TransactionKind::Implicit)) => self.rollback(),
            _ => Ok(()),
        }
    }

    pub fn transaction_state(&self) -> &TransactionState {
        self.transactions.state()
    }

    /// True if an explicit transaction is open
    pub fn in_transaction(&self) -> bool {
        self.transactions.is_explicit()
    }

    pub fn is_read_only(&self) -> bool {
        self.pager.is_read_only()
    }

    pub fn is_memory(&self) -> bool {
        !self.pager.is_persistent()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get storage statistics
    pub fn stats(&mut self) -> Result<StorageStats> {
        self.transactions.check_usable()?;
        Ok(StorageStats {
            page_size: self.pager.page_size(),
            page_count: self.pager.page_count(),
            free_pages: self.pager.free_page_count()?,
            leaf_pages: self.space.len(),
            key_count: self.index.len(),
            cached_pages: self.pager.cached_pages(),
            dirty_pages: self.pager.dirty_pages(),
            change_counter: self.pager.change_counter(),
        })
    }

    /// Close the storage engine.
    ///
    /// An explicit transaction still open is rolled back.
    pub fn close(mut self) -> Result<()> {
        match self.transactions.active() {
            Some((id, TransactionKind::Explicit)) => {
                tracing::warn!(id, "Closing with an open transaction, rolling back");
                self.rollback()?;
            }
            Some((_, TransactionKind::Implicit)) => self.commit()?,
            None => {}
        }
        self.pager.close()?;
        tracing::info!(path = ?self.path, "Database closed");
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.pager.is_read_only() {
            return Err(Error::ReadOnly);
        }
        self.transactions.check_usable()
    }

    fn begin_write(&mut self) -> Result<()> {
        self.check_writable()?;
        if let Some(id) = self.transactions.ensure_open()? {
            tracing::trace!(id, "Implicit transaction opened");
        }
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        let limit = page::max_key_len(self.pager.page_size());
        if key.len() > limit {
            return Err(Error::InvalidArgument(format!(
                "key of {} bytes exceeds the {} byte limit",
                key.len(),
                limit
            )));
        }
        Ok(())
    }

    fn rollback_pages(&mut self) -> Result<()> {
        let result = self.pager.rollback();
        for entry in self.undo.drain(..).rev() {
            match entry {
                Undo::Index { key, previous } => match previous {
                    Some(page_no) => {
                        self.index.insert(key, page_no);
                    }
                    None => {
                        self.index.remove(&key);
                    }
                },
                Undo::Space { page, previous } => match previous {
                    Some(free) => {
                        self.space.insert(page, free);
                    }
                    None => {
                        self.space.remove(&page);
                    }
                },
            }
        }
        result
    }

    fn set_index(&mut self, key: Vec<u8>, page_no: Option<u64>) {
        let previous = match page_no {
            Some(page_no) => self.index.insert(key.clone(), page_no),
            None => self.index.remove(&key),
        };
        self.undo.push(Undo::Index { key, previous });
    }

    fn set_space(&mut self, page: u64, free: Option<usize>) {
        let previous = match free {
            Some(free) => self.space.insert(page, free),
            None => self.space.remove(&page),
        };
        self.undo.push(Undo::Space { page, previous });
    }

    fn read_leaf(&mut self, page_no: u64) -> Result<LeafPage> {
        LeafPage::decode(&self.pager.read(page_no)?)
    }

    fn write_leaf(&mut self, page_no: u64, leaf: &LeafPage) -> Result<()> {
        let page_size = self.pager.page_size();
        self.pager.write(page_no, leaf.encode(page_size)?)?;
        self.set_space(page_no, Some(leaf.free_bytes(page_size)));
        Ok(())
    }

    fn insert_cell(&mut self, cell: Cell) -> Result<()> {
        let needed = cell.encoded_len();
        let target = self
            .space
            .iter()
            .find(|(_, free)| **free >= needed)
            .map(|(page_no, _)| *page_no);

        let (page_no, mut leaf) = match target {
            Some(page_no) => (page_no, self.read_leaf(page_no)?),
            None => (self.pager.allocate()?, LeafPage::default()),
        };

        let key = cell.key.clone();
        leaf.cells.push(cell);
        self.write_leaf(page_no, &leaf)?;
        self.set_index(key, Some(page_no));
        Ok(())
    }

    fn remove_cell(&mut self, key: &[u8]) -> Result<()> {
        let page_no = match self.index.get(key) {
            Some(page_no) => *page_no,
            None => return Ok(()),
        };

        let mut leaf = self.read_leaf(page_no)?;
        let pos = leaf.position(key).ok_or_else(|| {
            Error::Corrupted(format!("index points at page {} without key", page_no))
        })?;
        let cell = leaf.cells.remove(pos);
        if let CellValue::Overflow(first) = cell.value {
            self.free_overflow(first)?;
        }

        if leaf.cells.is_empty() {
            self.pager.free(page_no)?;
            self.set_space(page_no, None);
        } else {
            self.write_leaf(page_no, &leaf)?;
        }
        self.set_index(key.to_vec(), None);
        Ok(())
    }

    fn load_value(&mut self, cell: Cell) -> Result<Vec<u8>> {
        match cell.value {
            CellValue::Inline(value) => Ok(value),
            CellValue::Overflow(first) => self.read_overflow(first, cell.value_len as usize),
        }
    }

    fn write_overflow(&mut self, value: &[u8]) -> Result<u64> {
        let page_size = self.pager.page_size();
        let chunks: Vec<&[u8]> = value.chunks(page::overflow_capacity(page_size)).collect();

        let mut pages = Vec::with_capacity(chunks.len());
        for _ in &chunks {
            pages.push(self.pager.allocate()?);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let next = pages.get(i + 1).copied().unwrap_or(0);
            self.pager
                .write(pages[i], page::encode_overflow(page_size, next, chunk))?;
        }

        pages
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidArgument("empty overflow value".to_string()))
    }

    fn read_overflow(&mut self, first: u64, len: usize) -> Result<Vec<u8>> {
        let mut value = Vec::new();
        value.try_reserve(len).map_err(|_| Error::OutOfMemory)?;

        let mut next = first;
        let mut hops = 0u64;
        while value.len() < len {
            if next == 0 || hops > self.pager.page_count() {
                return Err(Error::Corrupted(format!(
                    "overflow chain starting at page {} is broken",
                    first
                )));
            }
            let data = self.pager.read(next)?;
            let (following, chunk) = page::decode_overflow(&data)?;
            value.extend_from_slice(chunk);
            next = following;
            hops += 1;
        }

        if value.len() != len {
            return Err(Error::Corrupted(format!(
                "overflow chain starting at page {} holds {} bytes, expected {}",
                first,
                value.len(),
                len
            )));
        }
        Ok(value)
    }

    fn free_overflow(&mut self, first: u64) -> Result<()> {
        let mut next = first;
        let mut hops = 0u64;
        while next != 0 {
            if hops > self.pager.page_count() {
                return Err(Error::Corrupted(format!(
                    "overflow chain starting at page {} loops",
                    first
                )));
            }
            let (following, _) = page::decode_overflow(&self.pager.read(next)?)?;
            self.pager.free(next)?;
            next = following;
            hops += 1;
        }
        Ok(())
    }
}

/// Smallest byte string greater than every string starting with `prefix`
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub page_size: usize,
    /// Pages in the database including the header page
    pub page_count: u64,
    /// Pages on the free list
    pub free_pages: u64,
    pub leaf_pages: usize,
    pub key_count: usize,
    pub cached_pages: usize,
    /// Pages modified by the open transaction
    pub dirty_pages: usize,
    /// Number of committed transactions over the file's lifetime
    pub change_counter: u64,
}
