//! Index module
//!
//! B+ tree indexes and the registry that persists them.

pub mod btree;
pub mod index_manager;

pub use btree::{BPlusTree, IndexEntry, IndexKey, ORDER};
pub use index_manager::{conventional_index_name, Index, IndexManager, IndexMetadata};
