//! Table file for PageDB
//!
//! A table file owns page allocation for one table: the ordered list of page ids and the
//! next id to hand out. The list is persisted to `<table>.meta` on every allocation so a
//! restart sees every page that was ever allocated.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::page::PageId;
use crate::error::{Error, Result};

/// File extension of a persisted page list
pub const META_EXTENSION: &str = "meta";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PageList {
    page_ids: Vec<PageId>,
    next_page_id: PageId,
}

/// Page allocation state of one table
#[derive(Debug)]
pub struct TableFile {
    table_name: String,
    meta_path: PathBuf,
    pages: PageList,
}

impl TableFile {
    /// Path of the page list file of a table
    pub fn meta_path(data_dir: &Path, table_name: &str) -> PathBuf {
        data_dir.join(format!("{}.{}", table_name, META_EXTENSION))
    }

    /// Create an empty table file and persist it
    pub fn create(data_dir: &Path, table_name: &str) -> Result<Self> {
        let file = Self {
            table_name: table_name.to_string(),
            meta_path: Self::meta_path(data_dir, table_name),
            pages: PageList::default(),
        };
        file.persist()?;
        Ok(file)
    }

    /// Load the page list of a table; a missing file means the table has no pages yet
    pub fn open(data_dir: &Path, table_name: &str) -> Result<Self> {
        let meta_path = Self::meta_path(data_dir, table_name);
        let pages = if meta_path.exists() {
            let json = fs::read_to_string(&meta_path)?;
            serde_json::from_str(&json).map_err(|e| {
                Error::StorageError(format!(
                    "unreadable page list {}: {}",
                    meta_path.display(),
                    e
                ))
            })?
        } else {
            PageList::default()
        };

        debug!(table = table_name, pages = pages.page_ids.len(), "table file opened");
        Ok(Self {
            table_name: table_name.to_string(),
            meta_path,
            pages,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Page ids in allocation order
    pub fn page_ids(&self) -> &[PageId] {
        &self.pages.page_ids
    }

    pub fn last_page_id(&self) -> Option<PageId> {
        self.pages.page_ids.last().copied()
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_ids.len()
    }

    /// Hand out the next page id and persist the updated list
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = self.pages.next_page_id;
        self.pages.next_page_id = page_id.checked_add(1).ok_or_else(|| {
            Error::StorageError(format!("table '{}' ran out of page ids", self.table_name))
        })?;
        self.pages.page_ids.push(page_id);
        self.persist()?;

        debug!(table = %self.table_name, page_id, "page allocated");
        Ok(page_id)
    }

    /// Delete the page list file
    pub fn delete(&self) -> Result<()> {
        if self.meta_path.exists() {
            fs::remove_file(&self.meta_path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.meta_path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.meta_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.meta_path, serde_json::to_string(&self.pages)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_pages() {
        let dir = TempDir::new().unwrap();
        let mut file = TableFile::create(dir.path(), "users").unwrap();

        assert_eq!(file.allocate_page().unwrap(), 0);
        assert_eq!(file.allocate_page().unwrap(), 1);
        assert_eq!(file.page_ids(), &[0, 1]);
        assert_eq!(file.last_page_id(), Some(1));
    }

    #[test]
    fn test_page_list_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut file = TableFile::create(dir.path(), "users").unwrap();
            file.allocate_page().unwrap();
            file.allocate_page().unwrap();
        }

        let mut file = TableFile::open(dir.path(), "users").unwrap();
        assert_eq!(file.page_count(), 2);
        assert_eq!(file.allocate_page().unwrap(), 2);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let file = TableFile::create(dir.path(), "users").unwrap();
        assert!(file.path().exists());

        file.delete().unwrap();
        assert!(!file.path().exists());
    }
}
