//! Database handle
//!
//! `Database` owns the storage manager, the buffer pool and the index registry and runs
//! SQL text through the whole pipeline: lexer, parser, resolver, planner, optimizer and
//! executors.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::executor::{ExecutionEngine, Optimizer, PhysicalPlan, Planner, QueryResult};
use crate::index::IndexManager;
use crate::sql::{Parser, QueryTree, Resolver};
use crate::storage::{BufferPool, StorageManager};

/// An open database rooted at a data directory
pub struct Database {
    config: DatabaseConfig,
    storage: StorageManager,
    pool: BufferPool,
    indexes: IndexManager,
}

impl Database {
    /// Open (or create) the database in `config.data_dir`, reloading every table and index
    /// found there.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage = StorageManager::open(&config.data_dir)?;
        let indexes = IndexManager::open(&config.data_dir)?;
        let pool = BufferPool::new(config.buffer_pool_size, storage.disk_manager());

        info!(
            data_dir = %config.data_dir.display(),
            tables = storage.catalog().list_tables().len(),
            indexes = indexes.list_indexes().len(),
            "database opened"
        );

        Ok(Self {
            config,
            storage,
            pool,
            indexes,
        })
    }

    /// Open with default settings at the given directory
    pub fn open_path(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(DatabaseConfig::new(data_dir))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Run one statement, reporting failure as an error
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing statement");
        let query = self.resolve(sql)?;

        ExecutionEngine::new(
            &mut self.storage,
            &mut self.pool,
            &mut self.indexes,
            &self.config,
        )
        .execute(query)
    }

    /// Run one statement. Errors are folded into a failed result.
    pub fn execute_query(&mut self, sql: &str) -> QueryResult {
        match self.execute(sql) {
            Ok(result) => result,
            Err(e) => {
                warn!(sql, error = %e, "statement failed");
                QueryResult::failure(e.to_string())
            }
        }
    }

    /// Run every `;`-separated statement of a script, one result per statement
    pub fn execute_script(&mut self, script: &str) -> Vec<QueryResult> {
        split_statements(script)
            .iter()
            .map(|statement| self.execute_query(statement))
            .collect()
    }

    /// Physical plan a SELECT would run with
    pub fn explain(&self, sql: &str) -> Result<PhysicalPlan> {
        let query = self.resolve(sql)?;
        let logical = Planner::new(self.config.predicate_mode).plan(query)?;
        Ok(Optimizer::new(&self.indexes).optimize(logical))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.storage.table_exists(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.storage.catalog().list_tables()
    }

    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.list_indexes()
    }

    /// Human-readable description of a table's columns
    pub fn table_info(&self, name: &str) -> Result<String> {
        self.storage.catalog().get_table_info(name)
    }

    /// Write every dirty cached page to disk
    pub fn flush(&mut self) -> Result<()> {
        self.pool.flush_all()
    }

    /// Flush and close
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    fn resolve(&self, sql: &str) -> Result<QueryTree> {
        let ast = Parser::new(sql).parse()?;
        debug!(ast = %ast, "parsed");
        Resolver::new(self.storage.catalog()).resolve(&ast)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.pool.flush_all() {
            warn!(error = %e, "failed to flush buffer pool on close");
        }
    }
}

/// Split a script on `;` outside single-quoted literals, dropping blank statements.
///
/// `--` line comments outside literals are removed up to the end of their line.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = script.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            ';' if !in_string => {
                statements.push(std::mem::take(&mut current));
            }
            '-' if !in_string && chars.peek() == Some(&'-') => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            _ => current.push(ch),
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use tempfile::TempDir;

    #[test]
    fn test_split_statements() {
        let statements =
            split_statements("CREATE TABLE t (a INT); INSERT INTO t VALUES ('x;y');  ;");
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE t (a INT)".to_string(),
                "INSERT INTO t VALUES ('x;y')".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_statements_skips_comments() {
        let statements = split_statements(
            "SELECT * FROM t -- a;b\n; -- it's a comment\nSELECT '--x' FROM t; -- trailing",
        );
        assert_eq!(
            statements,
            vec![
                "SELECT * FROM t".to_string(),
                "SELECT '--x' FROM t".to_string(),
            ]
        );
    }

    #[test]
    fn test_execute_script_with_comments() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open_path(dir.path()).unwrap();

        let results = db.execute_script(
            "CREATE TABLE t (id INTEGER); -- setup; not a statement\nINSERT INTO t VALUES (1);",
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[test]
    fn test_execute_query_folds_errors() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open_path(dir.path()).unwrap();

        let result = db.execute_query("SELECT * FROM missing");
        assert!(!result.success);
        assert!(result.message.contains("missing"));

        let err = db.execute("SELECT * FROM missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[test]
    fn test_explain_requires_select() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open_path(dir.path()).unwrap();
        db.execute("CREATE TABLE t (id INTEGER)").unwrap();

        assert!(matches!(
            db.explain("DROP TABLE t"),
            Err(Error::PlanError(_))
        ));
        assert!(!db.explain("SELECT id FROM t WHERE id = 1").unwrap().uses_index_scan());
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path()).buffer_pool_size(0);
        assert!(Database::open(config).is_err());
    }

    #[test]
    fn test_script() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open_path(dir.path()).unwrap();
        let results = db.execute_script(
            "CREATE TABLE t (id INT, name VARCHAR); INSERT INTO t VALUES (1, 'a'); SELECT * FROM t;",
        );
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[2].rows.len(), 1);
        assert_eq!(results[2].columns, vec!["id".to_string(), "name".to_string()]);
    }
}
