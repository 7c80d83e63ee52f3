//! Database configuration

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default number of pages kept in the buffer pool
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 100;

/// Default directory for table, page and index files
pub const DEFAULT_DATA_DIR: &str = "data";

/// How the planner turns an AND/OR predicate into a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicateMode {
    /// Keep only the leftmost comparison of an AND/OR tree.
    #[default]
    LeftBranch,
    /// Evaluate the whole predicate tree (extension).
    Full,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Directory holding every table, page and index file
    pub data_dir: PathBuf,
    /// Buffer pool capacity in pages
    pub buffer_pool_size: usize,
    /// AND/OR planning behaviour
    pub predicate_mode: PredicateMode,
    /// Write the touched page to disk after every inserted row
    pub write_through: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            predicate_mode: PredicateMode::LeftBranch,
            write_through: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a config rooted at the given data directory
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the buffer pool capacity
    pub fn buffer_pool_size(mut self, pages: usize) -> Self {
        self.buffer_pool_size = pages;
        self
    }

    /// Set the AND/OR planning behaviour
    pub fn predicate_mode(mut self, mode: PredicateMode) -> Self {
        self.predicate_mode = mode;
        self
    }

    /// Enable or disable synchronous page writes on insert
    pub fn write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_pool_size == 0 {
            return Err(Error::StorageError(
                "buffer pool size must be at least one page".to_string(),
            ));
        }
        Ok(())
    }
}
