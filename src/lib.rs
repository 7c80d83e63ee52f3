//! PageDB - a minimal single-node relational database written in Rust
//!
//! This library provides the core components for a SQL database:
//! - SQL front end (lexer, parser, resolver)
//! - Query planning and optimization
//! - Volcano-style execution
//! - Storage engine (pages, buffer pool, table files)
//! - B+ tree index
//! - System catalog
//! - TCP server

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod index;
pub mod server;
pub mod sql;
pub mod storage;

pub use config::{DatabaseConfig, PredicateMode};
pub use database::Database;
pub use error::{Error, ErrorKind, Result};
pub use executor::QueryResult;
