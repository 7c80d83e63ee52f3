//! Index registry for PageDB
//!
//! Every index has two files in the data directory: `<index>.idxmeta` records which
//! table column it covers and `<index>.idx` holds the serialized tree. Trees are loaded
//! when the registry is opened and written back only by an explicit `save_index`.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::btree::BPlusTree;
use crate::error::{Error, Result};

/// File extension of index metadata
pub const INDEX_META_EXTENSION: &str = "idxmeta";
/// File extension of a serialized tree
pub const INDEX_TREE_EXTENSION: &str = "idx";

/// The column an index covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub table_name: String,
    pub column_name: String,
}

/// An open index
#[derive(Debug)]
pub struct Index {
    pub name: String,
    pub metadata: IndexMetadata,
    pub tree: BPlusTree,
}

/// Conventional name of the index on `table.column`
pub fn conventional_index_name(table: &str, column: &str) -> String {
    format!("{}_{}_idx", table, column)
}

/// Registry of every index in the data directory
#[derive(Debug)]
pub struct IndexManager {
    data_dir: PathBuf,
    indexes: IndexMap<String, Index>,
}

impl IndexManager {
    /// Create an empty registry without touching the disk
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            indexes: IndexMap::new(),
        }
    }

    /// Load every index whose metadata file is found in `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let mut manager = Self::new(data_dir);
        fs::create_dir_all(&manager.data_dir)?;

        let mut meta_paths: Vec<PathBuf> = fs::read_dir(&manager.data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .map_or(false, |ext| ext == INDEX_META_EXTENSION)
            })
            .collect();
        meta_paths.sort();

        for path in meta_paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            let json = fs::read_to_string(&path)?;
            let metadata: IndexMetadata = serde_json::from_str(&json).map_err(|e| {
                Error::StorageError(format!("unreadable index metadata {}: {}", path.display(), e))
            })?;

            let tree_path = manager.tree_path(&name);
            let tree = if tree_path.exists() {
                BPlusTree::load_from_disk(&tree_path)?
            } else {
                warn!(index = %name, "index tree file missing, starting empty");
                BPlusTree::new()
            };

            debug!(index = %name, table = %metadata.table_name, entries = tree.len(), "index loaded");
            manager.indexes.insert(
                name.clone(),
                Index {
                    name,
                    metadata,
                    tree,
                },
            );
        }

        info!(indexes = manager.indexes.len(), "index registry loaded");
        Ok(manager)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, INDEX_META_EXTENSION))
    }

    fn tree_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, INDEX_TREE_EXTENSION))
    }

    /// Register a new, empty index and persist its metadata and tree
    pub fn create_index(&mut self, name: &str, table: &str, column: &str) -> Result<&mut Index> {
        if self.indexes.contains_key(name) {
            return Err(Error::IndexAlreadyExists(name.to_string()));
        }

        let metadata = IndexMetadata {
            table_name: table.to_string(),
            column_name: column.to_string(),
        };
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.meta_path(name), serde_json::to_string_pretty(&metadata)?)?;

        let tree = BPlusTree::new();
        tree.save_to_disk(self.tree_path(name))?;

        info!(index = name, table, column, "index created");
        let entry = self.indexes.entry(name.to_string());
        Ok(entry.or_insert(Index {
            name: name.to_string(),
            metadata,
            tree,
        }))
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn get_index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .get(name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    pub fn get_index_mut(&mut self, name: &str) -> Result<&mut Index> {
        self.indexes
            .get_mut(name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// Find an index on `table.column`.
    ///
    /// The conventional name `<table>_<column>_idx` is tried first, then the metadata of
    /// every index. Column names compare ignoring case.
    pub fn find_index_for_column(&self, table: &str, column: &str) -> Option<&Index> {
        let covers = |index: &&Index| {
            index.metadata.table_name == table
                && index.metadata.column_name.eq_ignore_ascii_case(column)
        };

        self.indexes
            .get(&conventional_index_name(table, column))
            .filter(covers)
            .or_else(|| self.indexes.values().find(covers))
    }

    /// Names of every index defined on a table
    pub fn indexes_for_table(&self, table: &str) -> Vec<String> {
        self.indexes
            .values()
            .filter(|index| index.metadata.table_name == table)
            .map(|index| index.name.clone())
            .collect()
    }

    /// Write an index tree to its file
    pub fn save_index(&self, name: &str) -> Result<()> {
        let index = self.get_index(name)?;
        index.tree.save_to_disk(self.tree_path(name))?;
        debug!(index = name, entries = index.tree.len(), "index saved");
        Ok(())
    }

    /// Remove an index with both of its files
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        if self.indexes.shift_remove(name).is_none() {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        for path in [self.meta_path(name), self.tree_path(name)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        info!(index = name, "index dropped");
        Ok(())
    }

    /// Remove every index of a table and return their names
    pub fn drop_indexes_for_table(&mut self, table: &str) -> Result<Vec<String>> {
        let names = self.indexes_for_table(table);
        for name in &names {
            self.drop_index(name)?;
        }
        Ok(names)
    }

    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }
}
