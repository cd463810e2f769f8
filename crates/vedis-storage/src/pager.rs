//! Page cache and journaled commit.
//!
//! Pages modified by the open transaction live in `dirty` until commit or
//! rollback; the store only ever holds committed pages except during the
//! write phase of a commit, which the rollback journal protects.

use crate::backend::PageStore;
use crate::page::{self, DbHeader, HEADER_LEN};
use crate::StorageConfig;
use std::collections::{BTreeMap, HashMap, VecDeque};
use vedis_core::{Error, Result};
use vedis_journal::{HotJournal, Journal, JournalRecord, SyncMode};

/// Clean page cache with FIFO eviction
#[derive(Debug)]
struct PageCache {
    capacity: usize,
    pages: HashMap<u64, Vec<u8>>,
    order: VecDeque<u64>,
}

impl PageCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pages: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, page_no: u64) -> Option<&Vec<u8>> {
        self.pages.get(&page_no)
    }

    fn insert(&mut self, page_no: u64, data: Vec<u8>) {
        if self.capacity == 0 {
            return;
        }
        if self.pages.insert(page_no, data).is_none() {
            self.order.push_back(page_no);
        }
        while self.pages.len() > self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.pages.remove(&old);
                }
                None => break,
            }
        }
    }

    fn remove(&mut self, page_no: u64) {
        if self.pages.remove(&page_no).is_some() {
            self.order.retain(|p| *p != page_no);
        }
    }

    fn clear(&mut self) {
        self.pages.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.pages.len()
    }
}

/// Owns the page store and mediates every page read and write
pub struct Pager {
    store: Box<dyn PageStore>,
    journal: Option<Journal>,
    page_size: usize,
    sync_mode: SyncMode,
    read_only: bool,
    /// Header including this transaction's changes
    header: DbHeader,
    /// Header as last committed
    committed: DbHeader,
    cache: PageCache,
    dirty: BTreeMap<u64, Vec<u8>>,
    /// Set once a commit has started overwriting the store
    store_touched: bool,
}

impl Pager {
    /// Open a pager over `store`.
    ///
    /// `journal` is `None` for memory databases. A hot journal is played
    /// back before the header is read; an empty store is initialized with a
    /// fresh header unless the pager is read-only.
    pub fn open(
        mut store: Box<dyn PageStore>,
        journal: Option<Journal>,
        config: &StorageConfig,
    ) -> Result<Self> {
        page::validate_page_size(config.page_size)?;

        if let Some(journal) = &journal {
            Self::recover_hot_journal(store.as_mut(), journal, config.read_only)?;
        }

        let header = if store.size()? == 0 {
            let header = DbHeader::new(config.page_size);
            if !config.read_only {
                store.write_at(0, &header.encode())?;
                store.sync()?;
                tracing::debug!(page_size = config.page_size, "Initialized empty database");
            }
            header
        } else {
            let header = DbHeader::decode(&store.read_at(0, HEADER_LEN.min(store.size()? as usize))?)?;
            let expected = header.page_count * header.page_size as u64;
            if store.size()? < expected {
                return Err(Error::Corrupted(format!(
                    "database file holds {} bytes, header claims {} pages of {} bytes",
                    store.size()?,
                    header.page_count,
                    header.page_size
                )));
            }
            header
        };

        Ok(Self {
            store,
            journal,
            page_size: header.page_size as usize,
            sync_mode: config.sync_mode,
            read_only: config.read_only,
            header,
            committed: header,
            cache: PageCache::new(config.cache_pages),
            dirty: BTreeMap::new(),
            store_touched: false,
        })
    }

    fn recover_hot_journal(
        store: &mut dyn PageStore,
        journal: &Journal,
        read_only: bool,
    ) -> Result<()> {
        match journal.hot()? {
            Some(hot) => {
                if read_only {
                    tracing::warn!("Hot journal present but the database was opened read-only");
                    return Err(Error::ReadOnly);
                }
                tracing::warn!(
                    images = hot.images.len(),
                    page_count = hot.page_count,
                    "Rolling back interrupted commit from hot journal"
                );
                Self::play_back(store, &hot)?;
                journal.remove()
            }
            None => {
                if journal.exists() && !read_only {
                    tracing::debug!("Discarding stale journal");
                    journal.remove()?;
                }
                Ok(())
            }
        }
    }

    fn play_back(store: &mut dyn PageStore, hot: &HotJournal) -> Result<()> {
        let page_size = hot.page_size as u64;
        for (page_no, data) in &hot.images {
            store.write_at(page_no * page_size, data)?;
        }
        store.truncate(hot.page_count * page_size)?;
        store.sync()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u64 {
        self.header.page_count
    }

    pub fn change_counter(&self) -> u64 {
        self.committed.change_counter
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    pub fn dirty_pages(&self) -> usize {
        self.dirty.len()
    }

    /// True if the open transaction changed anything
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty() || self.header != self.committed
    }

    /// Read a page, preferring this transaction's copy
    pub fn read(&mut self, page_no: u64) -> Result<Vec<u8>> {
        if page_no == 0 || page_no >= self.header.page_count {
            return Err(Error::Corrupted(format!(
                "page {} out of range (page count {})",
                page_no, self.header.page_count
            )));
        }
        if let Some(data) = self.dirty.get(&page_no) {
            return Ok(data.clone());
        }
        if let Some(data) = self.cache.get(page_no) {
            return Ok(data.clone());
        }

        tracing::trace!(page_no, "Page read");
        let data = self
            .store
            .read_at(page_no * self.page_size as u64, self.page_size)?;
        self.cache.insert(page_no, data.clone());
        Ok(data)
    }

    /// Replace the content of a page within the open transaction
    pub fn write(&mut self, page_no: u64, data: Vec<u8>) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        if page_no == 0 || page_no >= self.header.page_count || data.len() != self.page_size {
            return Err(Error::Corrupted(format!(
                "invalid write of {} bytes to page {}",
                data.len(),
                page_no
            )));
        }
        self.cache.remove(page_no);
        self.dirty.insert(page_no, data);
        Ok(())
    }

    /// Get a page for new content, reusing the free list first
    pub fn allocate(&mut self) -> Result<u64> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let head = self.header.freelist_head;
        if head != 0 {
            let next = page::decode_free(&self.read(head)?)?;
            self.header.freelist_head = next;
            return Ok(head);
        }
        let page_no = self.header.page_count;
        self.header.page_count += 1;
        Ok(page_no)
    }

    /// Return a page to the free list
    pub fn free(&mut self, page_no: u64) -> Result<()> {
        let page = page::encode_free(self.page_size, self.header.freelist_head);
        self.write(page_no, page)?;
        self.header.freelist_head = page_no;
        Ok(())
    }

    /// Number of pages currently on the free list
    pub fn free_page_count(&mut self) -> Result<u64> {
        let mut count = 0;
        let mut next = self.header.freelist_head;
        while next != 0 {
            count += 1;
            if count > self.header.page_count {
                return Err(Error::Corrupted("free list contains a cycle".to_string()));
            }
            next = page::decode_free(&self.read(next)?)?;
        }
        Ok(count)
    }

    /// Make the open transaction's pages durable.
    ///
    /// On error the caller must [`rollback`](Self::rollback).
    pub fn commit(&mut self) -> Result<()> {
        if !self.has_changes() {
            return Ok(());
        }
        if self.read_only {
            return Err(Error::ReadOnly);
        }

        self.header.change_counter = self.committed.change_counter + 1;
        let header_page = self.header.encode();

        if let Some(journal) = &self.journal {
            let mut writer = journal.begin(
                self.page_size as u32,
                self.committed.page_count,
                self.header.change_counter,
            )?;
            let originals = std::iter::once(0u64).chain(
                self.dirty
                    .keys()
                    .copied()
                    .filter(|p| *p < self.committed.page_count),
            );
            let mut images = 0u64;
            for page_no in originals {
                let original = self
                    .store
                    .read_at(page_no * self.page_size as u64, self.page_size)?;
                writer.append(&JournalRecord::page_image(page_no, original))?;
                images += 1;
            }
            writer.append(&JournalRecord::seal(images, self.header.change_counter))?;
            writer.sync()?;
            tracing::trace!(images, "Journal sealed");
        }

        self.store_touched = true;
        for (page_no, data) in &self.dirty {
            self.store
                .write_at(page_no * self.page_size as u64, data)?;
        }
        self.store.write_at(0, &header_page)?;
        self.store
            .truncate(self.header.page_count * self.page_size as u64)?;
        if self.sync_mode != SyncMode::None {
            self.store.sync()?;
        }

        if let Some(journal) = &self.journal {
            journal.remove()?;
        }
        self.store_touched = false;

        for (page_no, data) in std::mem::take(&mut self.dirty) {
            self.cache.insert(page_no, data);
        }
        self.committed = self.header;
        tracing::debug!(
            change_counter = self.committed.change_counter,
            page_count = self.committed.page_count,
            "Pages committed"
        );
        Ok(())
    }

    /// Discard the open transaction's pages.
    ///
    /// If a commit already started overwriting the store, the journal is
    /// played back to restore it.
    pub fn rollback(&mut self) -> Result<()> {
        self.dirty.clear();
        self.header = self.committed;

        if self.store_touched {
            self.cache.clear();
            let journal = self.journal.as_ref().ok_or_else(|| {
                Error::Corrupted("memory store failed during commit".to_string())
            })?;
            let hot = journal.hot()?.ok_or_else(|| {
                Error::Corrupted("journal needed for rollback is not sealed".to_string())
            })?;
            tracing::warn!(images = hot.images.len(), "Restoring pages from journal");
            Self::play_back(self.store.as_mut(), &hot)?;
            journal.remove()?;
            self.store_touched = false;
        }
        Ok(())
    }

    /// Flush the store before the handle goes away
    pub fn close(&mut self) -> Result<()> {
        if !self.read_only {
            self.store.sync()?;
        }
        Ok(())
    }
}
