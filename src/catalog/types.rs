//! Data types for PageDB
//!
//! This module defines the column types a table can declare and their on-page width.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum VARCHAR payload in bytes
pub const VARCHAR_MAX_LEN: usize = 100;

/// Width of the length prefix stored in front of every VARCHAR payload
pub const VARCHAR_LEN_PREFIX: usize = 4;

/// SQL Data Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Signed 32-bit integer
    Integer,
    /// UTF-8 text of at most `VARCHAR_MAX_LEN` bytes
    Varchar,
}

impl DataType {
    /// Resolve a declared type name (`INT`, `INTEGER`, `VARCHAR`, `STRING`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Some(DataType::Integer),
            "VARCHAR" | "STRING" => Some(DataType::Varchar),
            _ => None,
        }
    }

    /// Number of bytes this type occupies in a row slot
    pub fn size(&self) -> usize {
        match self {
            DataType::Integer => 4,
            DataType::Varchar => VARCHAR_LEN_PREFIX + VARCHAR_MAX_LEN,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Varchar => write!(f, "VARCHAR"),
        }
    }
}
