//! Storage manager for PageDB
//!
//! The storage manager owns the catalog and the table-file registry. Row reads and
//! writes go through a borrowed `BufferPool`; the manager itself caches no pages.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::buffer_pool::BufferPool;
use super::disk::DiskManager;
use super::page::{Page, PageId, PAGE_SIZE, ROW_COUNT_SIZE};
use super::row::{decode_row, encode_row, Row};
use super::table_file::TableFile;
use crate::catalog::{Catalog, TableMetadata};
use crate::error::{Error, Result};

/// Physical address of a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub page_id: PageId,
    pub slot_id: u32,
}

/// Storage manager
#[derive(Debug)]
pub struct StorageManager {
    catalog: Catalog,
    table_files: HashMap<String, TableFile>,
    disk: Arc<DiskManager>,
}

impl StorageManager {
    /// Open the data directory, reloading every table found there
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let catalog = Catalog::load(data_dir)?;

        let mut table_files = HashMap::new();
        for name in catalog.list_tables() {
            let file = TableFile::open(data_dir, &name)?;
            table_files.insert(name, file);
        }

        info!(dir = %data_dir.display(), tables = table_files.len(), "storage opened");
        Ok(Self {
            catalog,
            table_files,
            disk: Arc::new(DiskManager::new(data_dir)),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn disk_manager(&self) -> Arc<DiskManager> {
        self.disk.clone()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.catalog.table_exists(name)
    }

    pub fn table_metadata(&self, name: &str) -> Result<&TableMetadata> {
        self.catalog.get_table(name)
    }

    pub fn table_file(&self, name: &str) -> Result<&TableFile> {
        self.table_files
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    pub fn table_file_mut(&mut self, name: &str) -> Result<&mut TableFile> {
        self.table_files
            .get_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Register a table in the catalog and create its page list
    pub fn create_table(&mut self, metadata: TableMetadata) -> Result<()> {
        if metadata.columns().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table '{}' must have at least one column",
                metadata.name()
            )));
        }
        if ROW_COUNT_SIZE + metadata.row_size() > PAGE_SIZE {
            return Err(Error::InvalidSchema(format!(
                "a row of table '{}' needs {} bytes and does not fit in a page",
                metadata.name(),
                metadata.row_size()
            )));
        }

        let name = metadata.name().to_string();
        self.catalog.create_table(metadata)?;
        let file = TableFile::create(self.disk.data_dir(), &name)?;
        self.table_files.insert(name.clone(), file);

        info!(table = %name, "table created");
        Ok(())
    }

    /// Append a row to the table's last page, rolling over to a new page when full.
    ///
    /// The row is encoded (and length-checked) before any page is touched. The page is
    /// left dirty in the pool; the caller decides whether to flush it.
    pub fn insert_row(
        &mut self,
        pool: &mut BufferPool,
        table: &str,
        row: &Row,
    ) -> Result<RowLocation> {
        let metadata = self.catalog.get_table(table)?;
        let bytes = encode_row(metadata, row)?;
        let row_size = bytes.len();

        let last = self.table_file(table)?.last_page_id();
        let page_id = match last {
            Some(page_id) if pool.fetch_page(table, page_id)?.has_room(row_size) => page_id,
            _ => {
                let page_id = self.table_file_mut(table)?.allocate_page()?;
                pool.add_page(table, Page::new(page_id))?;
                page_id
            }
        };

        let slot_id = pool.fetch_page_mut(table, page_id)?.append_row(&bytes)?;
        debug!(table, page_id, slot_id, "row inserted");
        Ok(RowLocation { page_id, slot_id })
    }

    /// Read a single row by location; `None` if the slot holds no row
    pub fn read_row(
        &self,
        pool: &mut BufferPool,
        table: &str,
        location: RowLocation,
    ) -> Result<Option<Row>> {
        let metadata = self.catalog.get_table(table)?;
        let page = pool.fetch_page(table, location.page_id)?;
        match page.row_bytes(location.slot_id, metadata.row_size()) {
            Some(bytes) => decode_row(metadata, bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Every row of a table in page allocation order, paired with its location
    pub fn scan_rows(
        &self,
        pool: &mut BufferPool,
        table: &str,
    ) -> Result<Vec<(RowLocation, Row)>> {
        let metadata = self.catalog.get_table(table)?;
        let row_size = metadata.row_size();
        let mut rows = Vec::new();

        for &page_id in self.table_file(table)?.page_ids() {
            let page = pool.fetch_page(table, page_id)?;
            for slot_id in 0..page.row_count() {
                if let Some(bytes) = page.row_bytes(slot_id, row_size) {
                    rows.push((RowLocation { page_id, slot_id }, decode_row(metadata, bytes)?));
                }
            }
        }
        Ok(rows)
    }

    /// Remove a table with all of its files.
    ///
    /// Files go first while the table is still registered, so a failed delete leaves the
    /// table usable and a retried DROP can finish the job. Cached pages are discarded
    /// without write-back only once every file is gone. Afterwards the data directory is
    /// re-checked and `Error::IncompleteDrop` is raised if anything of the table remains.
    pub fn drop_table(&mut self, pool: &mut BufferPool, name: &str) -> Result<()> {
        if !self.catalog.table_exists(name) {
            return Err(Error::TableNotFound(name.to_string()));
        }

        if let Some(file) = self.table_files.get(name) {
            for &page_id in file.page_ids() {
                self.disk.delete_page(name, page_id)?;
            }
        }
        // Page files that never made it into the page list
        for path in self.disk.page_files(name)? {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove stray page file");
            }
        }
        // By path, so a retry still finds it
        let meta = TableFile::meta_path(self.disk.data_dir(), name);
        match fs::remove_file(&meta) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.catalog.drop_table(name)?;

        self.table_files.remove(name);
        pool.discard_table(name);

        self.verify_dropped(name)?;
        info!(table = name, "table dropped");
        Ok(())
    }

    fn verify_dropped(&self, name: &str) -> Result<()> {
        let mut remaining: Vec<String> = self
            .disk
            .page_files(name)?
            .into_iter()
            .map(|p| p.display().to_string())
            .collect();

        let schema = self.catalog.schema_path(name);
        if schema.exists() {
            remaining.push(schema.display().to_string());
        }
        let meta = TableFile::meta_path(self.disk.data_dir(), name);
        if meta.exists() {
            remaining.push(meta.display().to_string());
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(Error::IncompleteDrop(remaining.join(", ")))
        }
    }
}
