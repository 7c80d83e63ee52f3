//! System Catalog for PageDB
//!
//! The catalog maps table names to their metadata. Each entry is persisted as its own
//! `<table>.schema` file in the data directory and reloaded at startup.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use super::schema::TableMetadata;
use crate::error::{Error, Result};

/// File extension of a persisted table schema
pub const SCHEMA_EXTENSION: &str = "schema";

/// System Catalog - table name to metadata
#[derive(Debug)]
pub struct Catalog {
    /// Directory holding the schema files
    data_dir: PathBuf,
    /// Table metadata by name, in creation (or load) order
    tables: IndexMap<String, TableMetadata>,
}

impl Catalog {
    /// Create an empty catalog rooted at `data_dir` without touching the disk
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            tables: IndexMap::new(),
        }
    }

    /// Load every `*.schema` file found in `data_dir`
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let mut catalog = Self::new(data_dir);
        fs::create_dir_all(&catalog.data_dir)?;

        let mut paths: Vec<PathBuf> = fs::read_dir(&catalog.data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == SCHEMA_EXTENSION))
            .collect();
        paths.sort();

        for path in paths {
            let json = fs::read_to_string(&path)?;
            let metadata: TableMetadata = serde_json::from_str(&json).map_err(|e| {
                Error::StorageError(format!("unreadable catalog file {}: {}", path.display(), e))
            })?;
            debug!(table = metadata.name(), "loaded table schema");
            catalog.tables.insert(metadata.name().to_string(), metadata);
        }

        info!(tables = catalog.tables.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Path of the schema file for a table
    pub fn schema_path(&self, table_name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", table_name, SCHEMA_EXTENSION))
    }

    /// Register and persist a new table
    pub fn create_table(&mut self, metadata: TableMetadata) -> Result<()> {
        if self.tables.contains_key(metadata.name()) {
            return Err(Error::TableAlreadyExists(metadata.name().to_string()));
        }

        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(self.schema_path(metadata.name()), json)?;

        self.tables.insert(metadata.name().to_string(), metadata);
        Ok(())
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Result<&TableMetadata> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Delete a table's schema file, then forget the table.
    ///
    /// The entry stays registered if the file cannot be removed.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if !self.tables.contains_key(name) {
            return Err(Error::TableNotFound(name.to_string()));
        }

        let path = self.schema_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.tables.shift_remove(name);
        Ok(())
    }

    /// List all table names
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Get table schema info as a formatted string (for the `.schema` command)
    pub fn get_table_info(&self, name: &str) -> Result<String> {
        let table = self.get_table(name)?;
        let mut info = format!("Table: {}\n", table.name());
        info.push_str("Columns:\n");
        for col in table.columns() {
            info.push_str(&format!("  {} {}\n", col.name, col.data_type));
        }
        Ok(info)
    }
}
