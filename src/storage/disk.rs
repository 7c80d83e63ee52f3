//! Disk manager for PageDB
//!
//! This module handles direct file I/O for pages. Every page of every table lives in
//! its own `<table>_page_<id>.dat` file inside the data directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::Result;
use crate::storage::page::{Page, PageId};

/// Disk manager
#[derive(Debug)]
pub struct DiskManager {
    /// Directory where data files are stored
    data_dir: PathBuf,
    /// Number of page writes issued so far
    pages_written: AtomicU64,
}

impl DiskManager {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            pages_written: AtomicU64::new(0),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File holding one page of a table
    pub fn page_path(&self, table: &str, page_id: PageId) -> PathBuf {
        self.data_dir.join(format!("{}_page_{}.dat", table, page_id))
    }

    /// Read a page. A page that was allocated but never written reads back empty.
    pub fn read_page(&self, table: &str, page_id: PageId) -> Result<Page> {
        let path = self.page_path(table, page_id);
        match fs::read(&path) {
            Ok(bytes) => {
                trace!(table, page_id, "page read");
                Page::from_file_bytes(table, &bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Page::new(page_id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_page(&self, table: &str, page: &Page) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.page_path(table, page.page_id()), page.to_file_bytes())?;
        self.pages_written.fetch_add(1, Ordering::Relaxed);
        trace!(table, page_id = page.page_id(), "page written");
        Ok(())
    }

    /// Delete a page file; a file that is already gone is not an error
    pub fn delete_page(&self, table: &str, page_id: PageId) -> Result<()> {
        match fs::remove_file(self.page_path(table, page_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Every page file on disk that belongs to `table`.
    ///
    /// Only names of the exact form `<table>_page_<digits>.dat` match, so table `t` never
    /// claims the pages of table `t_page`.
    pub fn page_files(&self, table: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_page_", table);
        let mut found = Vec::new();

        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_page_file = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".dat"))
                .map_or(false, |id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()));
            if is_page_file {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Total page writes since this manager was created
    pub fn pages_written(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }
}
