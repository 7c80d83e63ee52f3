//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Page layout and on-disk page files
//! - Row encoding
//! - Buffer pool
//! - Table files and the storage manager

pub mod buffer_pool;
pub mod disk;
pub mod page;
pub mod row;
pub mod storage_manager;
pub mod table_file;
pub mod value;

pub use buffer_pool::{BufferPool, PageKey};
pub use disk::DiskManager;
pub use page::{Page, PageId, PAGE_SIZE};
pub use row::Row;
pub use storage_manager::{RowLocation, StorageManager};
pub use table_file::TableFile;
pub use value::Value;
