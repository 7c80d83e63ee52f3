//! Catalog module
//!
//! This module contains the system catalog, table metadata, and data types.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::Catalog;
pub use schema::{Column, TableMetadata};
pub use types::{DataType, VARCHAR_MAX_LEN};
