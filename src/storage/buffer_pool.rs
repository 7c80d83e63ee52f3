//! Buffer pool for PageDB
//!
//! This module implements a fixed-size cache of pages keyed by (table, page id). Every
//! access stamps the entry with a logical clock; when the pool is full the entry with the
//! smallest stamp is evicted, written back first if it is dirty.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::disk::DiskManager;
use super::page::{Page, PageId};
use crate::error::{Error, Result};

/// A global page identifier (table name, page id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub table: String,
    pub page_id: PageId,
}

impl PageKey {
    pub fn new(table: impl Into<String>, page_id: PageId) -> Self {
        Self {
            table: table.into(),
            page_id,
        }
    }
}

#[derive(Debug)]
struct Frame {
    page: Page,
    last_access: u64,
}

/// Buffer pool
#[derive(Debug)]
pub struct BufferPool {
    /// Maximum number of cached pages
    capacity: usize,
    /// Cached pages
    entries: HashMap<PageKey, Frame>,
    /// Logical clock, bumped on every access
    clock: u64,
    /// Disk manager for file I/O
    disk: Arc<DiskManager>,
}

impl BufferPool {
    pub fn new(capacity: usize, disk: Arc<DiskManager>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity),
            clock: 0,
            disk,
        }
    }

    /// Read access to a page, loading it from disk on a miss
    pub fn fetch_page(&mut self, table: &str, page_id: PageId) -> Result<&Page> {
        let key = PageKey::new(table, page_id);
        self.load(&key)?;
        self.frame_mut(&key).map(|frame| &frame.page)
    }

    /// Write access to a page. The page is marked dirty before it is handed out.
    pub fn fetch_page_mut(&mut self, table: &str, page_id: PageId) -> Result<&mut Page> {
        let key = PageKey::new(table, page_id);
        self.load(&key)?;
        let frame = self.frame_mut(&key)?;
        frame.page.set_dirty(true);
        Ok(&mut frame.page)
    }

    /// Cache a freshly allocated page. It is dirty until first written.
    pub fn add_page(&mut self, table: &str, mut page: Page) -> Result<()> {
        let key = PageKey::new(table, page.page_id());
        if !self.entries.contains_key(&key) {
            self.make_room()?;
        }
        page.set_dirty(true);
        let last_access = self.tick();
        self.entries.insert(key, Frame { page, last_access });
        Ok(())
    }

    /// Write a cached page back if it is dirty
    pub fn flush_page(&mut self, table: &str, page_id: PageId) -> Result<()> {
        let key = PageKey::new(table, page_id);
        if let Some(frame) = self.entries.get_mut(&key) {
            if frame.page.is_dirty() {
                self.disk.write_page(table, &frame.page)?;
                frame.page.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Write back every dirty page
    pub fn flush_all(&mut self) -> Result<()> {
        let mut flushed = 0usize;
        for (key, frame) in self.entries.iter_mut() {
            if frame.page.is_dirty() {
                self.disk.write_page(&key.table, &frame.page)?;
                frame.page.set_dirty(false);
                flushed += 1;
            }
        }
        debug!(flushed, "buffer pool flushed");
        Ok(())
    }

    /// Drop every cached page of a table without writing anything back
    pub fn discard_table(&mut self, table: &str) {
        self.entries.retain(|key, _| key.table != table);
    }

    pub fn contains(&self, table: &str, page_id: PageId) -> bool {
        self.entries.contains_key(&PageKey::new(table, page_id))
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|f| f.page.is_dirty()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn disk_manager(&self) -> Arc<DiskManager> {
        self.disk.clone()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Make sure `key` is cached and stamp it as most recently used
    fn load(&mut self, key: &PageKey) -> Result<()> {
        let now = self.tick();
        if let Some(frame) = self.entries.get_mut(key) {
            frame.last_access = now;
            return Ok(());
        }

        self.make_room()?;
        let page = self.disk.read_page(&key.table, key.page_id)?;
        self.entries.insert(
            key.clone(),
            Frame {
                page,
                last_access: now,
            },
        );
        Ok(())
    }

    fn frame_mut(&mut self, key: &PageKey) -> Result<&mut Frame> {
        self.entries.get_mut(key).ok_or_else(|| {
            Error::StorageError(format!(
                "page {} of table '{}' is not in the buffer pool",
                key.page_id, key.table
            ))
        })
    }

    /// Evict until there is space for one more page
    fn make_room(&mut self) -> Result<()> {
        while self.entries.len() >= self.capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, frame)| frame.last_access)
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else { break };
            self.evict(&victim)?;
        }
        Ok(())
    }

    fn evict(&mut self, key: &PageKey) -> Result<()> {
        if let Some(frame) = self.entries.get(key) {
            if frame.page.is_dirty() {
                debug!(table = %key.table, page_id = key.page_id, "writing back evicted page");
                self.disk.write_page(&key.table, &frame.page)?;
            }
        }
        self.entries.remove(key);
        debug!(table = %key.table, page_id = key.page_id, "page evicted");
        Ok(())
    }
}
