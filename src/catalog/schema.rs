//! Schema definitions for PageDB
//!
//! This module defines table metadata: the table name and its ordered columns.

use super::types::DataType;
use crate::storage::page::{PAGE_SIZE, ROW_COUNT_SIZE};
use serde::{Deserialize, Serialize};

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table ignoring case
    pub name: String,
    /// Declared type
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Table metadata - the catalog entry for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name (case-sensitive)
    name: String,
    /// Columns in declaration order
    columns: Vec<Column>,
}

impl TableMetadata {
    /// Create table metadata with no columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column
    pub fn add_column(&mut self, name: impl Into<String>, data_type: DataType) {
        self.columns.push(Column::new(name, data_type));
    }

    /// Builder form of `add_column`
    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.add_column(name, data_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column ignoring case
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Position of a column ignoring case
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Fixed stride of one encoded row
    pub fn row_size(&self) -> usize {
        self.columns.iter().map(|c| c.data_type.size()).sum()
    }

    /// Number of rows that fit on one page
    pub fn rows_per_page(&self) -> usize {
        match self.row_size() {
            0 => 0,
            size => (PAGE_SIZE - ROW_COUNT_SIZE) / size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableMetadata {
        TableMetadata::new("users")
            .with_column("id", DataType::Integer)
            .with_column("Name", DataType::Varchar)
    }

    #[test]
    fn test_table_metadata() {
        let table = users();

        assert_eq!(table.name(), "users");
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.column_names(), vec!["id", "Name"]);
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let table = users();

        assert_eq!(table.column_index("ID"), Some(0));
        assert_eq!(table.column_index("name"), Some(1));
        assert_eq!(
            table.get_column("NAME").map(|c| c.data_type),
            Some(DataType::Varchar)
        );
        assert!(table.get_column("email").is_none());
    }

    #[test]
    fn test_row_size() {
        let table = users();
        assert_eq!(table.row_size(), 108);
        // (4096 - 4) / 108
        assert_eq!(table.rows_per_page(), 37);
    }
}
